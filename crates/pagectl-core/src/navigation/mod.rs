//! In-page navigation with smooth scrolling
//!
//! - `easing` - easing curves (cubic, quintic, exponential)
//! - `timing` - progress and interpolation helpers
//! - `animation` - host-side scroll animator for hosts without native smooth scroll
//! - `navigator` - anchor activation with fixed-header offset

pub mod animation;
pub mod easing;
pub mod navigator;
pub mod timing;

pub use animation::ScrollAnimator;
pub use easing::EasingType;
pub use navigator::{Activation, SmoothScrollNavigator};
