pub mod a11y;
pub mod config;
pub mod context;
pub mod dom;
pub mod error;
pub mod images;
pub mod loader;
pub mod menu;
pub mod navigation;
pub mod rate_limit;
pub mod reveal;
pub mod scroll;
pub mod sim;
pub mod viewport;
pub mod visibility;

#[cfg(not(target_arch = "wasm32"))]
pub mod driver;

pub use config::{EasingType, PageConfig};
pub use context::{ClickTarget, EventOutcome, PageContext, PageEvent};
pub use dom::{ElementId, Host, Marker, Markup, Presentation, Role};
pub use error::{Error, Result};
pub use viewport::{ViewportSnapshot, ViewportTracker};
pub use visibility::{Capability, GeometryObserver, VisibilityObserver};

#[cfg(not(target_arch = "wasm32"))]
pub use driver::{DrivenHost, PageDriver};
