//! Scroll animation controller
//!
//! Combines easing and timing to drive a smooth scroll on hosts that do not
//! animate `scroll_to` natively.

use std::time::Duration;

use web_time::Instant;

use crate::config::{EasingType, NavigationConfig};

use super::timing::{is_complete, lerp, progress};

/// Active scroll animation state
#[derive(Debug, Clone)]
struct ActiveAnimation {
    /// Set on the first frame after the animation was requested
    start: Option<Instant>,
    from: f64,
    to: f64,
    duration: Duration,
    easing: EasingType,
}

/// Scroll animation controller
///
/// Call `scroll_to()` to begin an animation, then `update()` each frame
/// to get the current interpolated scroll position.
#[derive(Debug, Clone)]
pub struct ScrollAnimator {
    animation: Option<ActiveAnimation>,
    duration: Duration,
    easing: EasingType,
    current_scroll: f64,
}

impl Default for ScrollAnimator {
    fn default() -> Self {
        Self::new(&NavigationConfig::default())
    }
}

impl ScrollAnimator {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            animation: None,
            duration: Duration::from_millis(config.animation_duration_ms),
            easing: config.easing,
            current_scroll: 0.0,
        }
    }

    #[inline]
    pub fn is_smooth(&self) -> bool {
        !self.duration.is_zero()
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Final position after the animation
    pub fn target_scroll(&self) -> f64 {
        self.animation
            .as_ref()
            .map(|a| a.to)
            .unwrap_or(self.current_scroll)
    }

    #[inline]
    pub fn current_scroll(&self) -> f64 {
        self.current_scroll
    }

    /// Set scroll position immediately (no animation)
    pub fn set_scroll(&mut self, scroll: f64) {
        self.animation = None;
        self.current_scroll = scroll;
    }

    /// Start a scroll animation to `target`, clamped to `[0, max_scroll]`.
    ///
    /// A running animation is replaced and the new one starts from the
    /// current visible position.
    pub fn scroll_to(&mut self, target: f64, max_scroll: f64) {
        let target = target.clamp(0.0, max_scroll.max(0.0));

        if !self.is_smooth() {
            self.current_scroll = target;
            self.animation = None;
            return;
        }

        if (self.current_scroll - target).abs() < f64::EPSILON {
            self.animation = None;
            return;
        }

        self.animation = Some(ActiveAnimation {
            start: None,
            from: self.current_scroll,
            to: target,
            duration: self.duration,
            easing: self.easing,
        });
    }

    /// Advance the animation and return the current position
    pub fn update(&mut self, now: Instant) -> f64 {
        if let Some(anim) = self.animation.as_mut() {
            let start = *anim.start.get_or_insert(now);
            if is_complete(start, anim.duration, now) {
                self.current_scroll = anim.to;
                self.animation = None;
            } else {
                let t = progress(start, anim.duration, now);
                self.current_scroll = lerp(anim.from, anim.to, anim.easing.apply(t));
            }
        }

        self.current_scroll
    }

    /// Stop at the current position
    pub fn cancel(&mut self) {
        self.animation = None;
    }
}
