//! Page loader overlay: fades as soon as the window has loaded, then leaves
//! the layout after a short delay. The minimum display timer is a second
//! path that hides it once loading completed.

use std::time::Duration;

use tracing::{debug, trace};
use web_time::Instant;

use crate::config::LoaderConfig;
use crate::dom::{ElementId, Host, Marker, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    /// Not started, or the markup has no loader
    Absent,
    Showing { shown_until: Instant },
    Hidden { remove_at: Instant },
    Removed,
}

#[derive(Debug, Clone)]
pub struct PageLoader {
    min_display: Duration,
    removal_delay: Duration,
    element: Option<ElementId>,
    loaded: bool,
    phase: LoaderPhase,
}

impl PageLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            min_display: Duration::from_millis(config.min_display_ms),
            removal_delay: Duration::from_millis(config.removal_delay_ms),
            element: None,
            loaded: false,
            phase: LoaderPhase::Absent,
        }
    }

    pub fn phase(&self) -> LoaderPhase {
        self.phase
    }

    /// Arm the minimum display timer if the page has a loader
    pub fn start(&mut self, host: &impl Host, now: Instant) {
        if self.phase != LoaderPhase::Absent {
            return;
        }
        let Some(element) = host.find(Role::PageLoader) else {
            trace!("No page loader in markup");
            return;
        };
        self.element = Some(element);
        self.phase = LoaderPhase::Showing {
            shown_until: now + self.min_display,
        };
    }

    /// Window finished loading: hide right away
    pub fn on_load(&mut self, host: &mut impl Host, now: Instant) {
        self.loaded = true;
        if matches!(self.phase, LoaderPhase::Showing { .. }) {
            self.hide(host, now);
        }
        self.poll(host, now);
    }

    /// Earliest instant at which `poll` has something to do
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            LoaderPhase::Showing { shown_until } if self.loaded => Some(shown_until),
            LoaderPhase::Hidden { remove_at } => Some(remove_at),
            _ => None,
        }
    }

    pub fn poll(&mut self, host: &mut impl Host, now: Instant) {
        if let LoaderPhase::Showing { shown_until } = self.phase {
            if !self.loaded || now < shown_until {
                return;
            }
            self.hide(host, now);
        }

        let Some(element) = self.element.clone() else {
            return;
        };
        if let LoaderPhase::Hidden { remove_at } = self.phase {
            if now >= remove_at {
                host.set_style(Some(&element), "display", Some("none"));
                self.phase = LoaderPhase::Removed;
                debug!("Page loader removed from layout");
            }
        }
    }

    fn hide(&mut self, host: &mut impl Host, now: Instant) {
        let Some(element) = &self.element else {
            return;
        };
        host.add_marker(element, Marker::Hidden);
        self.phase = LoaderPhase::Hidden {
            remove_at: now + self.removal_delay,
        };
        debug!("Page loader hidden");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Markup;
    use crate::sim::{PageLayout, SimulatedPage};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_late_load_hides_immediately() {
        let mut page = SimulatedPage::from_layout(&PageLayout::default());
        let loader_el = page.find(Role::PageLoader).unwrap();
        let mut loader = PageLoader::new(&LoaderConfig::default());
        let t0 = Instant::now();

        loader.start(&page, t0);
        assert_eq!(loader.next_deadline(), None);

        // Timer elapsing before load does nothing
        loader.poll(&mut page, t0 + ms(1000));
        assert!(!page.has_marker(&loader_el, Marker::Hidden));

        loader.on_load(&mut page, t0 + ms(1500));
        assert!(page.has_marker(&loader_el, Marker::Hidden));
        assert_eq!(loader.next_deadline(), Some(t0 + ms(2000)));

        loader.poll(&mut page, t0 + ms(1999));
        assert_eq!(page.style(&loader_el, "display"), None);
        loader.poll(&mut page, t0 + ms(2000));
        assert_eq!(page.style(&loader_el, "display"), Some("none"));
        assert_eq!(loader.phase(), LoaderPhase::Removed);
    }

    #[test]
    fn test_early_load_hides_without_waiting() {
        let mut page = SimulatedPage::from_layout(&PageLayout::default());
        let loader_el = page.find(Role::PageLoader).unwrap();
        let mut loader = PageLoader::new(&LoaderConfig::default());
        let t0 = Instant::now();

        loader.start(&page, t0);
        loader.on_load(&mut page, t0 + ms(200));
        assert!(page.has_marker(&loader_el, Marker::Hidden));
        assert_eq!(loader.next_deadline(), Some(t0 + ms(700)));

        // The minimum display timer elapsing later changes nothing
        let writes = page.mutations().len();
        loader.poll(&mut page, t0 + ms(690));
        loader.on_load(&mut page, t0 + ms(695));
        assert_eq!(page.mutations().len(), writes);

        loader.poll(&mut page, t0 + ms(1000));
        assert_eq!(page.style(&loader_el, "display"), Some("none"));
        assert_eq!(loader.phase(), LoaderPhase::Removed);
    }

    #[test]
    fn test_no_loader_is_noop() {
        let mut page = SimulatedPage::from_layout(&PageLayout::builder().bare().build());
        let mut loader = PageLoader::new(&LoaderConfig::default());
        let t0 = Instant::now();

        loader.start(&page, t0);
        loader.on_load(&mut page, t0 + ms(5000));
        assert_eq!(loader.phase(), LoaderPhase::Absent);
        assert_eq!(loader.next_deadline(), None);
        assert!(page.mutations().is_empty());
    }
}
