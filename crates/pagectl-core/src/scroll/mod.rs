//! Scroll-driven presentation state
//!
//! - `state` - pure derivation of navbar / back-to-top / active section
//! - `reconciler` - applies only the deltas on rate-limited ticks

pub mod reconciler;
pub mod state;

pub use reconciler::{ScrollDelta, ScrollStateReconciler};
pub use state::ScrollState;
