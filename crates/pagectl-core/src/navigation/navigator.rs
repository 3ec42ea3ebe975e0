use tracing::{debug, trace};

use crate::config::NavigationConfig;
use crate::dom::{ElementId, Host, ScrollBehavior};
use crate::menu::MenuStateMachine;

/// Result of activating a link
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// In-page target found; default navigation must be suppressed
    Scrolled {
        target: ElementId,
        top: f64,
        closed_menu: bool,
    },
    /// Fragment with no matching element: let the browser navigate
    BrokenAnchor,
    /// Not an in-page fragment
    NotInPage,
}

impl Activation {
    pub fn prevents_default(&self) -> bool {
        matches!(self, Activation::Scrolled { .. })
    }
}

/// Smooth, fixed-header-aware in-page navigation
#[derive(Debug, Clone)]
pub struct SmoothScrollNavigator {
    header_offset: f64,
}

impl SmoothScrollNavigator {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            header_offset: config.header_offset,
        }
    }

    pub fn handle_activation(
        &self,
        href: &str,
        host: &mut impl Host,
        menu: &mut MenuStateMachine,
    ) -> Activation {
        let Some(fragment) = href.strip_prefix('#') else {
            return Activation::NotInPage;
        };
        if fragment.is_empty() {
            return Activation::BrokenAnchor;
        }

        let Some(target) = host.element_by_id(fragment) else {
            trace!(href, "Anchor target absent, falling through");
            return Activation::BrokenAnchor;
        };
        let Some(rect) = host.geometry(&target) else {
            trace!(href, "Anchor target has no layout, falling through");
            return Activation::BrokenAnchor;
        };

        let top = (rect.top - self.header_offset).max(0.0);
        host.scroll_to(top, ScrollBehavior::Smooth);
        let closed_menu = menu.force_close(host);

        debug!(href, top, closed_menu, "Smooth scroll to anchor");
        Activation::Scrolled {
            target,
            top,
            closed_menu,
        }
    }

    /// Back-to-top control
    pub fn scroll_to_top(&self, host: &mut impl Host) {
        host.scroll_to(0.0, ScrollBehavior::Smooth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MenuConfig;
    use crate::sim::{Mutation, PageLayout, SimulatedPage};

    fn page() -> SimulatedPage {
        SimulatedPage::from_layout(
            &PageLayout::builder()
                .section("home", 0.0, 600.0)
                .section("about", 600.0, 900.0)
                .build(),
        )
    }

    #[test]
    fn test_scrolls_with_header_offset_and_closes_menu() {
        let mut page = page();
        let navigator = SmoothScrollNavigator::new(&NavigationConfig::default());
        let mut menu = MenuStateMachine::new(&MenuConfig::default());
        menu.toggle(&mut page);

        let activation = navigator.handle_activation("#about", &mut page, &mut menu);
        assert!(activation.prevents_default());
        assert_eq!(
            activation,
            Activation::Scrolled {
                target: ElementId::new("about"),
                top: 520.0,
                closed_menu: true,
            }
        );
        assert!(!menu.is_open());
        assert!(page.mutations().contains(&Mutation::ScrollTo {
            top: 520.0,
            behavior: ScrollBehavior::Smooth,
        }));
    }

    #[test]
    fn test_top_clamped_at_zero() {
        let mut page = page();
        let navigator = SmoothScrollNavigator::new(&NavigationConfig::default());
        let mut menu = MenuStateMachine::new(&MenuConfig::default());

        match navigator.handle_activation("#home", &mut page, &mut menu) {
            Activation::Scrolled { top, closed_menu, .. } => {
                assert_eq!(top, 0.0);
                assert!(!closed_menu);
            }
            other => panic!("unexpected activation {other:?}"),
        }
    }

    #[test]
    fn test_broken_anchor_falls_through() {
        let mut page = page();
        let navigator = SmoothScrollNavigator::new(&NavigationConfig::default());
        let mut menu = MenuStateMachine::new(&MenuConfig::default());
        menu.toggle(&mut page);
        let writes = page.mutations().len();

        let activation = navigator.handle_activation("#missing", &mut page, &mut menu);
        assert_eq!(activation, Activation::BrokenAnchor);
        assert!(!activation.prevents_default());
        assert!(menu.is_open());
        assert_eq!(page.mutations().len(), writes);

        assert_eq!(navigator.handle_activation("#", &mut page, &mut menu), Activation::BrokenAnchor);
        assert_eq!(
            navigator.handle_activation("/contact", &mut page, &mut menu),
            Activation::NotInPage
        );
    }
}
