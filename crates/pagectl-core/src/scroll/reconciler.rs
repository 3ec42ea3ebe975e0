use tracing::{debug, trace};

use crate::config::ScrollConfig;
use crate::dom::{Host, Marker, Role};

use super::state::{self, ScrollState};

/// Changes applied by one tick. `None` fields were left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollDelta {
    pub navbar_scrolled: Option<bool>,
    pub back_to_top_visible: Option<bool>,
    pub active_section: Option<Option<String>>,
}

impl ScrollDelta {
    pub fn is_empty(&self) -> bool {
        self.navbar_scrolled.is_none()
            && self.back_to_top_visible.is_none()
            && self.active_section.is_none()
    }

    fn merge(self, other: ScrollDelta) -> ScrollDelta {
        ScrollDelta {
            navbar_scrolled: other.navbar_scrolled.or(self.navbar_scrolled),
            back_to_top_visible: other.back_to_top_visible.or(self.back_to_top_visible),
            active_section: other.active_section.or(self.active_section),
        }
    }
}

/// Owns the applied `ScrollState` and writes only the differences
#[derive(Debug, Clone)]
pub struct ScrollStateReconciler {
    config: ScrollConfig,
    applied: ScrollState,
}

impl ScrollStateReconciler {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            applied: ScrollState::default(),
        }
    }

    /// State currently reflected in the presentation
    pub fn state(&self) -> &ScrollState {
        &self.applied
    }

    /// Both streams at once
    pub fn on_scroll_tick(&mut self, host: &mut impl Host) -> ScrollDelta {
        let fast = self.on_fast_tick(host);
        let slow = self.on_slow_tick(host);
        fast.merge(slow)
    }

    /// Navbar and back-to-top, driven by the fast throttle
    pub fn on_fast_tick(&mut self, host: &mut impl Host) -> ScrollDelta {
        let scroll_y = host.scroll_y();
        let mut delta = ScrollDelta::default();

        let scrolled = state::navbar_scrolled(scroll_y, &self.config);
        if scrolled != self.applied.navbar_scrolled {
            self.applied.navbar_scrolled = scrolled;
            delta.navbar_scrolled = Some(scrolled);
            toggle_role_marker(host, Role::Navbar, Marker::Scrolled, scrolled);
        }

        let visible = state::back_to_top_visible(scroll_y, &self.config);
        if visible != self.applied.back_to_top_visible {
            self.applied.back_to_top_visible = visible;
            delta.back_to_top_visible = Some(visible);
            toggle_role_marker(host, Role::BackToTop, Marker::Visible, visible);
        }

        if !delta.is_empty() {
            debug!(scroll_y, ?delta, "Scroll state changed");
        }
        delta
    }

    /// Active navigation section, driven by the slow throttle
    pub fn on_slow_tick(&mut self, host: &mut impl Host) -> ScrollDelta {
        let scroll_y = host.scroll_y();
        let sections = host.sections();
        let active = state::active_section(&sections, scroll_y, self.config.section_lookahead)
            .map(|section| section.id.clone());

        if active == self.applied.active_section_id {
            return ScrollDelta::default();
        }

        let links = host.nav_links();
        if let Some(previous) = &self.applied.active_section_id {
            for link in links.iter().filter(|link| link.targets(previous)) {
                host.remove_marker(&link.element, Marker::Active);
                host.set_attribute(&link.element, "aria-current", None);
            }
        }
        if let Some(current) = &active {
            for link in links.iter().filter(|link| link.targets(current)) {
                host.add_marker(&link.element, Marker::Active);
                host.set_attribute(&link.element, "aria-current", Some("page"));
            }
        }

        debug!(scroll_y, from = ?self.applied.active_section_id, to = ?active, "Active section changed");
        self.applied.active_section_id = active.clone();
        ScrollDelta {
            active_section: Some(active),
            ..ScrollDelta::default()
        }
    }
}

fn toggle_role_marker(host: &mut impl Host, role: Role, marker: Marker, on: bool) {
    let Some(element) = host.find(role) else {
        trace!(?role, "Element absent, skipping marker update");
        return;
    };
    if on {
        host.add_marker(&element, marker);
    } else {
        host.remove_marker(&element, marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementId, Markup};
    use crate::sim::{PageLayout, SimulatedPage};

    fn page() -> SimulatedPage {
        SimulatedPage::from_layout(
            &PageLayout::builder()
                .section("a", 0.0, 100.0)
                .section("b", 100.0, 200.0)
                .section("c", 300.0, 200.0)
                .build(),
        )
    }

    #[test]
    fn test_repeated_tick_is_idempotent() {
        let mut page = page();
        let mut reconciler = ScrollStateReconciler::new(ScrollConfig::default());

        page.set_scroll_y(350.0);
        let first = reconciler.on_scroll_tick(&mut page);
        assert!(!first.is_empty());
        let writes = page.mutations().len();

        let second = reconciler.on_scroll_tick(&mut page);
        assert!(second.is_empty());
        assert_eq!(page.mutations().len(), writes);
    }

    #[test]
    fn test_markers_follow_thresholds() {
        let mut page = page();
        let navbar = page.find(Role::Navbar).unwrap();
        let back_to_top = page.find(Role::BackToTop).unwrap();
        let mut reconciler = ScrollStateReconciler::new(ScrollConfig::default());

        page.set_scroll_y(99.0);
        reconciler.on_fast_tick(&mut page);
        assert!(!page.has_marker(&navbar, Marker::Scrolled));

        page.set_scroll_y(101.0);
        reconciler.on_fast_tick(&mut page);
        assert!(page.has_marker(&navbar, Marker::Scrolled));
        assert!(!page.has_marker(&back_to_top, Marker::Visible));

        page.set_scroll_y(301.0);
        reconciler.on_fast_tick(&mut page);
        assert!(page.has_marker(&back_to_top, Marker::Visible));

        page.set_scroll_y(299.0);
        reconciler.on_fast_tick(&mut page);
        assert!(!page.has_marker(&back_to_top, Marker::Visible));
        assert!(page.has_marker(&navbar, Marker::Scrolled));
    }

    #[test]
    fn test_active_link_switches_and_clears() {
        let mut page = page();
        let link_b = ElementId::new("nav-b");
        let link_c = ElementId::new("nav-c");
        let mut reconciler = ScrollStateReconciler::new(ScrollConfig::default());

        page.set_scroll_y(150.0);
        reconciler.on_slow_tick(&mut page);
        assert_eq!(reconciler.state().active_section_id.as_deref(), Some("b"));
        assert!(page.has_marker(&link_b, Marker::Active));
        assert_eq!(page.attribute(&link_b, "aria-current"), Some("page"));

        page.set_scroll_y(250.0);
        reconciler.on_slow_tick(&mut page);
        assert!(!page.has_marker(&link_b, Marker::Active));
        assert_eq!(page.attribute(&link_b, "aria-current"), None);
        assert!(page.has_marker(&link_c, Marker::Active));

        page.set_scroll_y(450.0);
        let delta = reconciler.on_slow_tick(&mut page);
        assert_eq!(delta.active_section, Some(None));
        assert_eq!(reconciler.state().active_section_id, None);
        assert!(!page.has_marker(&link_c, Marker::Active));
    }

    #[test]
    fn test_missing_chrome_still_tracks_state() {
        let mut page = SimulatedPage::from_layout(&PageLayout::builder().bare().build());
        let mut reconciler = ScrollStateReconciler::new(ScrollConfig::default());

        page.set_scroll_y(500.0);
        let delta = reconciler.on_fast_tick(&mut page);
        assert_eq!(delta.navbar_scrolled, Some(true));
        assert!(reconciler.state().back_to_top_visible);
        assert!(page.mutations().is_empty());
    }
}
