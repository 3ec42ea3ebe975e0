//! Keyboard navigation indicator and the mobile viewport height unit.

use tracing::trace;

use crate::dom::{Host, Marker, Role};
use crate::viewport::ViewportSnapshot;

/// CSS custom property holding 1% of the viewport height
pub const VIEWPORT_UNIT_PROPERTY: &str = "--vh";

#[derive(Debug, Clone, Default)]
pub struct Accessibility {
    keyboard_navigation: bool,
    viewport_unit: Option<String>,
}

impl Accessibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyboard_navigation(&self) -> bool {
        self.keyboard_navigation
    }

    /// Tab switches the body into keyboard navigation mode
    pub fn on_key_down(&mut self, key: &str, host: &mut impl Host) {
        if key != "Tab" || self.keyboard_navigation {
            return;
        }
        if let Some(body) = host.find(Role::Body) {
            host.add_marker(&body, Marker::KeyboardNavigation);
            self.keyboard_navigation = true;
        }
    }

    pub fn on_mouse_down(&mut self, host: &mut impl Host) {
        if !self.keyboard_navigation {
            return;
        }
        if let Some(body) = host.find(Role::Body) {
            host.remove_marker(&body, Marker::KeyboardNavigation);
        }
        self.keyboard_navigation = false;
    }

    /// Write `--vh` on the document root when the viewport height changed
    pub fn update_viewport_unit(&mut self, host: &mut impl Host) {
        let value = ViewportSnapshot::capture(&*host).vh_unit();
        if self.viewport_unit.as_deref() == Some(value.as_str()) {
            trace!(%value, "Viewport unit unchanged");
            return;
        }
        host.set_style(None, VIEWPORT_UNIT_PROPERTY, Some(&value));
        self.viewport_unit = Some(value);
    }
}
