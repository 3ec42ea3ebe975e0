//! Reveal-on-scroll animation triggers.
//!
//! Elements are prepared on window load (reveal marker plus a staggered
//! transition delay), then activated either by the visibility observer or by
//! the scroll-position polling fallback, whichever sees them first.

use tracing::debug;

use crate::config::RevealConfig;
use crate::dom::{ElementId, Host, Marker};
use crate::viewport::ViewportSnapshot;
use crate::visibility::ObserveOptions;

#[derive(Debug, Clone)]
pub struct RevealAnimator {
    selectors: Vec<String>,
    options: ObserveOptions,
    stagger_secs: f64,
    fallback_visible_px: f64,
    prepared: Vec<ElementId>,
}

impl RevealAnimator {
    pub fn new(config: &RevealConfig) -> Self {
        Self {
            selectors: config.selectors.clone(),
            options: ObserveOptions {
                threshold: config.threshold,
                root_margin: config.root_margin,
            },
            stagger_secs: config.stagger_secs,
            fallback_visible_px: config.fallback_visible_px,
            prepared: Vec::new(),
        }
    }

    /// Observation options for reveal subscriptions
    pub fn observe_options(&self) -> ObserveOptions {
        self.options
    }

    pub fn prepared(&self) -> &[ElementId] {
        &self.prepared
    }

    /// Mark every group member for reveal and stagger it by its index within
    /// the group. Returns newly prepared elements; repeated calls skip
    /// elements that were already prepared.
    pub fn prepare(&mut self, host: &mut impl Host) -> Vec<ElementId> {
        let mut fresh = Vec::new();

        for selector in &self.selectors {
            for (index, element) in host.query_all(selector).into_iter().enumerate() {
                if self.prepared.contains(&element) {
                    continue;
                }
                host.add_marker(&element, Marker::Reveal);
                let delay = format!("{}s", stagger_delay(index, self.stagger_secs));
                host.set_style(Some(&element), "transition-delay", Some(&delay));
                self.prepared.push(element.clone());
                fresh.push(element);
            }
        }

        if !fresh.is_empty() {
            debug!(count = fresh.len(), "Prepared reveal targets");
        }
        fresh
    }

    /// Fire the reveal. Idempotent.
    pub fn activate(&self, host: &mut impl Host, element: &ElementId) -> bool {
        if host.has_marker(element, Marker::RevealActive) {
            return false;
        }
        host.add_marker(element, Marker::RevealActive);
        debug!(%element, "Revealed");
        true
    }

    /// Scroll-position fallback: activate prepared elements whose top edge
    /// is far enough above the viewport bottom
    pub fn poll_fallback(&self, host: &mut impl Host, viewport: &ViewportSnapshot) -> Vec<ElementId> {
        let limit = viewport.height - self.fallback_visible_px;
        let mut revealed = Vec::new();

        for element in &self.prepared {
            if host.has_marker(element, Marker::RevealActive) {
                continue;
            }
            let Some(rect) = host.geometry(element) else {
                continue;
            };
            if rect.top - viewport.scroll_y < limit && self.activate(host, element) {
                revealed.push(element.clone());
            }
        }

        revealed
    }
}

/// Delay in seconds for the n-th element of a group, rounded to the
/// millisecond so it renders cleanly as a CSS time
fn stagger_delay(index: usize, stagger_secs: f64) -> f64 {
    (index as f64 * stagger_secs * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Markup;
    use crate::sim::{PageLayout, SimulatedPage};

    fn page() -> SimulatedPage {
        SimulatedPage::from_layout(
            &PageLayout::builder()
                .card("g1", "game-card", 200.0, 300.0)
                .card("g2", "game-card", 900.0, 300.0)
                .card("g3", "game-card", 1600.0, 300.0)
                .card("s1", "server-card", 2400.0, 300.0)
                .build(),
        )
    }

    #[test]
    fn test_prepare_staggers_within_group() {
        let mut page = page();
        let mut reveal = RevealAnimator::new(&RevealConfig::default());

        let prepared = reveal.prepare(&mut page);
        assert_eq!(prepared.len(), 4);
        assert!(page.has_marker(&ElementId::new("g1"), Marker::Reveal));
        assert_eq!(page.style(&ElementId::new("g1"), "transition-delay"), Some("0s"));
        assert_eq!(page.style(&ElementId::new("g2"), "transition-delay"), Some("0.1s"));
        assert_eq!(page.style(&ElementId::new("g3"), "transition-delay"), Some("0.2s"));
        // Index restarts per group
        assert_eq!(page.style(&ElementId::new("s1"), "transition-delay"), Some("0s"));

        assert!(reveal.prepare(&mut page).is_empty());
    }

    #[test]
    fn test_polling_fallback() {
        let mut page = page();
        let mut reveal = RevealAnimator::new(&RevealConfig::default());
        reveal.prepare(&mut page);

        // Viewport 800 high: limit is 650 from the top of the viewport
        let viewport = page.viewport();
        let revealed = reveal.poll_fallback(&mut page, &viewport);
        assert_eq!(revealed, vec![ElementId::new("g1")]);

        page.set_scroll_y(300.0);
        let viewport = page.viewport();
        let revealed = reveal.poll_fallback(&mut page, &viewport);
        assert_eq!(revealed, vec![ElementId::new("g2")]);

        // Already active elements are not touched again
        let writes = page.mutations().len();
        page.set_scroll_y(0.0);
        let viewport = page.viewport();
        assert!(reveal.poll_fallback(&mut page, &viewport).is_empty());
        assert_eq!(page.mutations().len(), writes);
    }

    #[test]
    fn test_activate_idempotent() {
        let mut page = page();
        let reveal = RevealAnimator::new(&RevealConfig::default());
        let card = ElementId::new("g3");
        assert!(reveal.activate(&mut page, &card));
        assert!(!reveal.activate(&mut page, &card));
        assert!(page.has_marker(&card, Marker::RevealActive));
    }
}
