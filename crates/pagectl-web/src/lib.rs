#![forbid(unsafe_code)]

//! Browser host for the pagectl page controller.
//!
//! On `wasm32` this crate implements the viewport, markup and presentation
//! traits over `web-sys`, backs visibility with the browser's
//! `IntersectionObserver` when it exists, and exports a `PageController`
//! that wires the DOM listeners and timers into a `PageContext`.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::{PageController, WebHost};

/// Selector used to locate each controller-owned element in the markup
pub fn role_selector(role: pagectl_core::Role) -> &'static str {
    use pagectl_core::Role;

    match role {
        Role::Navbar => ".navbar",
        Role::NavToggle => "#nav-toggle",
        Role::NavMenu => "#nav-menu",
        Role::BackToTop => "#back-to-top",
        Role::PageLoader => "#page-loader",
        Role::Body => "body",
    }
}

/// Selector matching in-page anchors handled by smooth scrolling
pub const IN_PAGE_ANCHOR_SELECTOR: &str = "a[href^=\"#\"]";

/// Native builds compile this crate as a stub so `cargo check --workspace`
/// stays green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct PageController;

#[cfg(not(target_arch = "wasm32"))]
impl PageController {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}
