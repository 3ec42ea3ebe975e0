//! Markup (read) and presentation (write) contracts between the controller
//! and whatever page it runs against.
//!
//! Lookups return `Option`/empty collections: absent elements are an expected
//! state of the markup, never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::viewport::ViewportTracker;

/// Opaque handle to one element of the page
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Singleton elements the controller looks up by purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Navbar,
    NavToggle,
    NavMenu,
    BackToTop,
    PageLoader,
    Body,
}

/// Presentation markers owned by the controller.
/// Every marker belongs to exactly one concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Marker {
    /// Navigation link of the current section
    Active,
    /// Navbar past the scroll threshold
    Scrolled,
    /// Back-to-top control shown
    Visible,
    /// Mobile menu toggle and panel
    Open,
    /// Lazy image promoted
    Loaded,
    /// Element prepared for reveal
    Reveal,
    /// Reveal transition fired
    RevealActive,
    /// Page loader faded out
    Hidden,
    /// Body while navigating by keyboard
    KeyboardNavigation,
}

impl Marker {
    pub fn class_name(self) -> &'static str {
        match self {
            Marker::Active => "active",
            Marker::Scrolled => "scrolled",
            Marker::Visible => "visible",
            Marker::Open => "open",
            Marker::Loaded => "loaded",
            Marker::Reveal => "reveal",
            Marker::RevealActive => "reveal-active",
            Marker::Hidden => "hidden",
            Marker::KeyboardNavigation => "keyboard-navigation",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Registered markup region used for active-section tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

impl Section {
    pub fn new(id: impl Into<String>, top: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            top,
            height,
        }
    }

    /// Half-open membership test `[top, top + height)`
    pub fn contains(&self, position: f64) -> bool {
        position >= self.top && position < self.top + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavLink {
    pub element: ElementId,
    pub href: String,
}

impl NavLink {
    /// Whether this link targets the given section id
    pub fn targets(&self, section_id: &str) -> bool {
        self.href
            .strip_prefix('#')
            .is_some_and(|fragment| fragment == section_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LazyImage {
    pub element: ElementId,
    pub pending_src: String,
}

/// Document-relative vertical extent of an element
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Read side of the page
pub trait Markup {
    fn find(&self, role: Role) -> Option<ElementId>;

    /// Element carrying the given `id` attribute
    fn element_by_id(&self, id: &str) -> Option<ElementId>;

    /// Registered sections in document order
    fn sections(&self) -> Vec<Section>;

    fn nav_links(&self) -> Vec<NavLink>;

    /// Images still carrying a pending source
    fn lazy_images(&self) -> Vec<LazyImage>;

    /// Elements matching a simple selector, in document order
    fn query_all(&self, selector: &str) -> Vec<ElementId>;

    fn geometry(&self, element: &ElementId) -> Option<Rect>;

    fn image_source(&self, element: &ElementId) -> Option<String>;

    fn has_marker(&self, element: &ElementId, marker: Marker) -> bool;
}

/// Write side of the page. Every operation is naturally idempotent.
pub trait Presentation {
    fn add_marker(&mut self, element: &ElementId, marker: Marker);

    fn remove_marker(&mut self, element: &ElementId, marker: Marker);

    /// Set (`Some`) or remove (`None`) an attribute
    fn set_attribute(&mut self, element: &ElementId, name: &str, value: Option<&str>);

    fn set_image_source(&mut self, element: &ElementId, src: &str);

    /// Set or clear an inline style property. `None` targets the document root.
    fn set_style(&mut self, element: Option<&ElementId>, property: &str, value: Option<&str>);

    /// Lock or release background scrolling of the document
    fn set_scroll_locked(&mut self, locked: bool);

    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior);
}

/// Everything the controller needs from a page
pub trait Host: ViewportTracker + Markup + Presentation {}

impl<T: ViewportTracker + Markup + Presentation> Host for T {}
