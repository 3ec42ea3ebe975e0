//! Geometry-based visibility backend for hosts without a native observer
//! thread: intersections are computed from element rectangles on demand.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::dom::{ElementId, Markup, Rect};
use crate::viewport::ViewportSnapshot;

use super::margin::RootMargin;
use super::observer::{Consumer, IntersectionEntry, ObserveOptions, ObserverBackend};

#[derive(Debug, Clone)]
struct Target {
    options: ObserveOptions,
    last: Option<(bool, bool)>,
}

/// Cloneable handle: one clone goes into the `VisibilityObserver` as its
/// backend, another stays with the host to produce entries after scrolling.
#[derive(Debug, Clone, Default)]
pub struct GeometryObserver {
    targets: Rc<RefCell<BTreeMap<(ElementId, Consumer), Target>>>,
}

impl GeometryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> Vec<(ElementId, Consumer)> {
        self.targets.borrow().keys().cloned().collect()
    }

    /// Entries for every observed element whose state changed since the last
    /// call. Newly observed elements always report once.
    pub fn take_entries(
        &self,
        markup: &(impl Markup + ?Sized),
        viewport: &ViewportSnapshot,
    ) -> Vec<IntersectionEntry> {
        let mut entries = Vec::new();
        let mut targets = self.targets.borrow_mut();

        for ((element, consumer), target) in targets.iter_mut() {
            let Some(rect) = markup.geometry(element) else {
                continue;
            };
            let (ratio, is_intersecting) = intersection(&rect, viewport, &target.options.root_margin);
            let state = (is_intersecting, ratio >= target.options.threshold);

            if target.last != Some(state) {
                target.last = Some(state);
                entries.push(IntersectionEntry {
                    target: element.clone(),
                    consumer: *consumer,
                    ratio,
                    is_intersecting,
                });
            }
        }

        entries
    }
}

impl ObserverBackend for GeometryObserver {
    fn observe(&mut self, target: &ElementId, consumer: Consumer, options: &ObserveOptions) {
        self.targets.borrow_mut().insert(
            (target.clone(), consumer),
            Target {
                options: *options,
                last: None,
            },
        );
    }

    fn unobserve(&mut self, target: &ElementId, consumer: Consumer) {
        self.targets.borrow_mut().remove(&(target.clone(), consumer));
    }
}

/// Visible fraction of `rect` inside the margin-adjusted viewport band
pub fn intersection(rect: &Rect, viewport: &ViewportSnapshot, margin: &RootMargin) -> (f64, bool) {
    let (band_top, band_bottom) = viewport.band();
    let (band_top, band_bottom) = margin.expand(band_top, band_bottom);

    if rect.height <= 0.0 {
        let inside = rect.top >= band_top && rect.top < band_bottom;
        return (if inside { 1.0 } else { 0.0 }, inside);
    }

    let overlap = rect.bottom().min(band_bottom) - rect.top.max(band_top);
    if overlap <= 0.0 {
        return (0.0, false);
    }

    ((overlap / rect.height).clamp(0.0, 1.0), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(scroll_y: f64) -> ViewportSnapshot {
        ViewportSnapshot {
            scroll_y,
            height: 800.0,
            width: 1280.0,
        }
    }

    #[test]
    fn test_intersection_ratio() {
        let rect = Rect::new(700.0, 200.0);
        let (ratio, hit) = intersection(&rect, &viewport(0.0), &RootMargin::ZERO);
        assert!(hit);
        assert!((ratio - 0.5).abs() < 1e-9);

        let (ratio, hit) = intersection(&rect, &viewport(1000.0), &RootMargin::ZERO);
        assert!(!hit);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_negative_bottom_margin_shrinks_band() {
        let rect = Rect::new(760.0, 100.0);
        let margin: RootMargin = "0px 0px -50px 0px".parse().unwrap();
        let (_, hit) = intersection(&rect, &viewport(0.0), &margin);
        assert!(!hit);
        let (_, hit) = intersection(&rect, &viewport(0.0), &RootMargin::ZERO);
        assert!(hit);
    }

    #[test]
    fn test_fully_visible() {
        let rect = Rect::new(100.0, 50.0);
        let (ratio, hit) = intersection(&rect, &viewport(0.0), &RootMargin::ZERO);
        assert!(hit);
        assert_eq!(ratio, 1.0);
    }
}
