//! Mobile navigation menu state machine.
//!
//! `Open` always coincides with the page scroll lock and the open marker on
//! both the toggle control and the menu panel.

use tracing::{debug, trace};

use crate::config::MenuConfig;
use crate::dom::{ElementId, Host, Marker, Role};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MenuState {
    #[default]
    Closed,
    Open,
}

#[derive(Debug, Clone)]
pub struct MenuStateMachine {
    state: MenuState,
    mobile_breakpoint: f64,
}

impl MenuStateMachine {
    pub fn new(config: &MenuConfig) -> Self {
        Self {
            state: MenuState::Closed,
            mobile_breakpoint: config.mobile_breakpoint,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == MenuState::Open
    }

    /// Closed -> Open or Open -> Closed. No-op when the markup lacks the
    /// toggle or the panel.
    pub fn toggle(&mut self, host: &mut impl Host) -> MenuState {
        let Some(parts) = menu_parts(&*host) else {
            trace!("Menu toggle or panel absent, ignoring toggle");
            return self.state;
        };

        let next = match self.state {
            MenuState::Closed => MenuState::Open,
            MenuState::Open => MenuState::Closed,
        };
        self.enter(next, host, &parts);
        next
    }

    /// Open -> Closed. Returns false when the menu was already closed.
    pub fn force_close(&mut self, host: &mut impl Host) -> bool {
        if self.state == MenuState::Closed {
            return false;
        }
        match menu_parts(&*host) {
            Some(parts) => self.enter(MenuState::Closed, host, &parts),
            None => {
                // Markup vanished while open: still release the lock
                self.state = MenuState::Closed;
                host.set_scroll_locked(false);
            }
        }
        true
    }

    /// Resize tick: leaving the mobile layout closes the menu
    pub fn on_resize(&mut self, viewport_width: f64, host: &mut impl Host) -> bool {
        if viewport_width > self.mobile_breakpoint {
            self.force_close(host)
        } else {
            false
        }
    }

    fn enter(&mut self, next: MenuState, host: &mut impl Host, parts: &[ElementId; 2]) {
        for element in parts {
            match next {
                MenuState::Open => host.add_marker(element, Marker::Open),
                MenuState::Closed => host.remove_marker(element, Marker::Open),
            }
        }
        host.set_scroll_locked(next == MenuState::Open);
        debug!(from = ?self.state, to = ?next, "Menu transition");
        self.state = next;
    }
}

fn menu_parts(host: &impl Host) -> Option<[ElementId; 2]> {
    Some([host.find(Role::NavToggle)?, host.find(Role::NavMenu)?])
}
