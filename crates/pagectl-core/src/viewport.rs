//! On-demand reads of scroll position and viewport size.

/// Stateless environment reads. Implementations must not cache; callers
/// rate-limit how often they ask.
pub trait ViewportTracker {
    fn scroll_y(&self) -> f64;
    fn viewport_height(&self) -> f64;
    fn viewport_width(&self) -> f64;
}

/// Copy of the viewport taken once per tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportSnapshot {
    pub scroll_y: f64,
    pub height: f64,
    pub width: f64,
}

impl ViewportSnapshot {
    pub fn capture(tracker: &(impl ViewportTracker + ?Sized)) -> Self {
        Self {
            scroll_y: tracker.scroll_y(),
            height: tracker.viewport_height(),
            width: tracker.viewport_width(),
        }
    }

    /// Document-relative band currently on screen
    pub fn band(&self) -> (f64, f64) {
        (self.scroll_y, self.scroll_y + self.height)
    }

    /// Value of the `--vh` custom property (1% of the viewport height)
    pub fn vh_unit(&self) -> String {
        format!("{}px", self.height * 0.01)
    }
}

impl ViewportTracker for ViewportSnapshot {
    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn viewport_height(&self) -> f64 {
        self.height
    }

    fn viewport_width(&self) -> f64 {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_and_band() {
        let source = ViewportSnapshot {
            scroll_y: 120.0,
            height: 800.0,
            width: 1280.0,
        };
        let snapshot = ViewportSnapshot::capture(&source);
        assert_eq!(snapshot, source);
        assert_eq!(snapshot.band(), (120.0, 920.0));
    }

    #[test]
    fn test_vh_unit() {
        let snapshot = ViewportSnapshot {
            scroll_y: 0.0,
            height: 800.0,
            width: 400.0,
        };
        assert_eq!(snapshot.vh_unit(), "8px");
    }
}
