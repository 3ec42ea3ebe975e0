//! Intersection-based visibility subscriptions.
//!
//! Lazy images and reveal targets both subscribe here. The capability
//! (native backend or degraded eager mode) is chosen once when the
//! observer is built.

pub mod geometry;
pub mod margin;
pub mod observer;

pub use geometry::GeometryObserver;
pub use margin::RootMargin;
pub use observer::{
    Capability, Consumer, IntersectionEntry, Notification, ObserveOptions, ObserverBackend,
    TriggerPolicy, VisibilityObserver,
};
