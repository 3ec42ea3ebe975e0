//! In-memory page used by tests and by the replay harness.
//!
//! `SimulatedPage` implements every host trait, records each presentation
//! call in a mutation log, animates smooth scrolls with `ScrollAnimator` and
//! produces intersection entries for a shared `GeometryObserver`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;
use web_time::Instant;

use crate::config::NavigationConfig;
use crate::dom::{
    ElementId, LazyImage, Markup, Marker, NavLink, Presentation, Rect, Role, ScrollBehavior, Section,
};
use crate::navigation::ScrollAnimator;
use crate::viewport::{ViewportSnapshot, ViewportTracker};
use crate::visibility::{GeometryObserver, IntersectionEntry};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionLayout {
    pub id: String,
    pub top: f64,
    pub height: f64,
    /// Add a navigation link `nav-<id>` pointing at `#<id>`
    #[serde(default = "default_true")]
    pub nav_link: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayout {
    pub id: String,
    pub top: f64,
    pub height: f64,
    #[serde(default)]
    pub src: Option<String>,
    /// Deferred source (`data-src`) of a lazy image
    #[serde(default)]
    pub pending_src: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    pub id: String,
    pub class: String,
    pub top: f64,
    pub height: f64,
}

/// Declarative description of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    #[serde(default)]
    pub viewport: ViewportSize,
    /// Navbar, menu toggle and panel, back-to-top control, loader and body
    #[serde(default = "default_true")]
    pub chrome: bool,
    /// Defaults to the bottom of the lowest element, at least one viewport
    #[serde(default)]
    pub document_height: Option<f64>,
    #[serde(default)]
    pub sections: Vec<SectionLayout>,
    #[serde(default)]
    pub images: Vec<ImageLayout>,
    #[serde(default)]
    pub cards: Vec<CardLayout>,
    /// Image sources that fail to load
    #[serde(default)]
    pub broken_sources: Vec<String>,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            viewport: ViewportSize::default(),
            chrome: true,
            document_height: None,
            sections: Vec::new(),
            images: Vec::new(),
            cards: Vec::new(),
            broken_sources: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl PageLayout {
    pub fn builder() -> PageLayoutBuilder {
        PageLayoutBuilder::default()
    }

    fn content_bottom(&self) -> f64 {
        let sections = self.sections.iter().map(|s| s.top + s.height);
        let images = self.images.iter().map(|i| i.top + i.height);
        let cards = self.cards.iter().map(|c| c.top + c.height);
        sections.chain(images).chain(cards).fold(0.0, f64::max)
    }

    fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        let declared = self
            .sections
            .iter()
            .map(|s| s.id.as_str())
            .chain(self.images.iter().map(|i| i.id.as_str()))
            .chain(self.cards.iter().map(|c| c.id.as_str()));
        for id in declared {
            if id.is_empty() {
                return Err(Error::Scenario("element with empty id".to_string()));
            }
            if !ids.insert(id) {
                return Err(Error::Scenario(format!("duplicate element id '{id}'")));
            }
        }
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return Err(Error::Scenario("viewport must have a positive size".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageLayoutBuilder {
    layout: PageLayout,
}

impl PageLayoutBuilder {
    pub fn viewport(mut self, width: f64, height: f64) -> Self {
        self.layout.viewport = ViewportSize { width, height };
        self
    }

    /// Page without any controller-owned chrome
    pub fn bare(mut self) -> Self {
        self.layout.chrome = false;
        self
    }

    pub fn document_height(mut self, height: f64) -> Self {
        self.layout.document_height = Some(height);
        self
    }

    pub fn section(mut self, id: &str, top: f64, height: f64) -> Self {
        self.layout.sections.push(SectionLayout {
            id: id.to_string(),
            top,
            height,
            nav_link: true,
        });
        self
    }

    pub fn lazy_image(mut self, id: &str, top: f64, height: f64, pending_src: &str) -> Self {
        self.layout.images.push(ImageLayout {
            id: id.to_string(),
            top,
            height,
            src: None,
            pending_src: Some(pending_src.to_string()),
        });
        self
    }

    pub fn image(mut self, id: &str, top: f64, height: f64, src: &str) -> Self {
        self.layout.images.push(ImageLayout {
            id: id.to_string(),
            top,
            height,
            src: Some(src.to_string()),
            pending_src: None,
        });
        self
    }

    pub fn card(mut self, id: &str, class: &str, top: f64, height: f64) -> Self {
        self.layout.cards.push(CardLayout {
            id: id.to_string(),
            class: class.to_string(),
            top,
            height,
        });
        self
    }

    pub fn broken_source(mut self, src: &str) -> Self {
        self.layout.broken_sources.push(src.to_string());
        self
    }

    pub fn build(self) -> PageLayout {
        self.layout
    }
}

/// One recorded presentation call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    AddMarker {
        element: ElementId,
        marker: Marker,
    },
    RemoveMarker {
        element: ElementId,
        marker: Marker,
    },
    SetAttribute {
        element: ElementId,
        name: String,
        value: Option<String>,
    },
    SetSource {
        element: ElementId,
        src: String,
    },
    SetStyle {
        /// `None` is the document root
        element: Option<ElementId>,
        property: String,
        value: Option<String>,
    },
    ScrollLock {
        locked: bool,
    },
    ScrollTo {
        top: f64,
        behavior: ScrollBehavior,
    },
}

impl Mutation {
    /// Single-line JSON rendering for machine-readable logs
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::AddMarker { element, marker } => write!(f, "{element} +{marker}"),
            Mutation::RemoveMarker { element, marker } => write!(f, "{element} -{marker}"),
            Mutation::SetAttribute {
                element,
                name,
                value: Some(value),
            } => write!(f, "{element} [{name}=\"{value}\"]"),
            Mutation::SetAttribute {
                element,
                name,
                value: None,
            } => write!(f, "{element} [{name}] removed"),
            Mutation::SetSource { element, src } => write!(f, "{element} src={src}"),
            Mutation::SetStyle {
                element,
                property,
                value,
            } => {
                let target = element.as_ref().map_or(":root", ElementId::as_str);
                match value {
                    Some(value) => write!(f, "{target} {{{property}: {value}}}"),
                    None => write!(f, "{target} {{{property}}} cleared"),
                }
            }
            Mutation::ScrollLock { locked: true } => f.write_str("scroll locked"),
            Mutation::ScrollLock { locked: false } => f.write_str("scroll released"),
            Mutation::ScrollTo { top, behavior } => write!(f, "scroll to {top} ({behavior:?})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Block,
    Image,
    NavLink,
}

#[derive(Debug, Clone)]
struct SimElement {
    id: ElementId,
    kind: Kind,
    role: Option<Role>,
    classes: Vec<String>,
    rect: Option<Rect>,
    markers: BTreeSet<Marker>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    src: Option<String>,
}

impl SimElement {
    fn new(id: &str, kind: Kind) -> Self {
        Self {
            id: ElementId::new(id),
            kind,
            role: None,
            classes: Vec::new(),
            rect: None,
            markers: BTreeSet::new(),
            attributes: BTreeMap::new(),
            styles: BTreeMap::new(),
            src: None,
        }
    }

    fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    fn with_rect(mut self, top: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(top, height));
        self
    }

    fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }
}

/// In-memory host
#[derive(Debug, Clone)]
pub struct SimulatedPage {
    elements: Vec<SimElement>,
    viewport: ViewportSize,
    document_height: Option<f64>,
    scroll_y: f64,
    scroll_locked: bool,
    root_styles: BTreeMap<String, String>,
    animator: ScrollAnimator,
    observer: GeometryObserver,
    broken_sources: BTreeSet<String>,
    failed_loads: Vec<ElementId>,
    mutations: Vec<Mutation>,
}

impl SimulatedPage {
    pub fn from_layout(layout: &PageLayout) -> Self {
        Self::with_navigation(layout, &NavigationConfig::default())
    }

    /// Page whose smooth scrolls use the given duration and easing
    pub fn with_navigation(layout: &PageLayout, navigation: &NavigationConfig) -> Self {
        let mut elements = Vec::new();

        if layout.chrome {
            elements.push(SimElement::new("page-loader", Kind::Block).with_role(Role::PageLoader));
            elements.push(SimElement::new("body", Kind::Block).with_role(Role::Body));
            elements.push(
                SimElement::new("navbar", Kind::Block)
                    .with_role(Role::Navbar)
                    .with_rect(0.0, 80.0),
            );
            elements.push(SimElement::new("nav-toggle", Kind::Block).with_role(Role::NavToggle));
            elements.push(SimElement::new("nav-menu", Kind::Block).with_role(Role::NavMenu));
        }

        for section in layout.sections.iter().filter(|s| s.nav_link) {
            let mut link = SimElement::new(&format!("nav-{}", section.id), Kind::NavLink);
            link.attributes
                .insert("href".to_string(), format!("#{}", section.id));
            elements.push(link.with_class("nav-link"));
        }

        for section in &layout.sections {
            elements.push(SimElement::new(&section.id, Kind::Block).with_rect(section.top, section.height));
        }

        for image in &layout.images {
            let mut element = SimElement::new(&image.id, Kind::Image).with_rect(image.top, image.height);
            element.src = image.src.clone();
            if let Some(pending) = &image.pending_src {
                element.attributes.insert("data-src".to_string(), pending.clone());
            }
            elements.push(element);
        }

        for card in &layout.cards {
            elements.push(
                SimElement::new(&card.id, Kind::Block)
                    .with_rect(card.top, card.height)
                    .with_class(&card.class),
            );
        }

        if layout.chrome {
            elements.push(SimElement::new("back-to-top", Kind::Block).with_role(Role::BackToTop));
        }

        let broken_sources: BTreeSet<String> = layout.broken_sources.iter().cloned().collect();
        // Sources present in the markup start loading right away
        let failed_loads = elements
            .iter()
            .filter(|e| e.src.as_ref().is_some_and(|src| broken_sources.contains(src)))
            .map(|e| e.id.clone())
            .collect();

        Self {
            elements,
            viewport: layout.viewport,
            document_height: layout
                .document_height
                .or_else(|| Some(layout.content_bottom().max(layout.viewport.height))),
            scroll_y: 0.0,
            scroll_locked: false,
            root_styles: BTreeMap::new(),
            animator: ScrollAnimator::new(navigation),
            observer: GeometryObserver::new(),
            broken_sources,
            failed_loads,
            mutations: Vec::new(),
        }
    }

    /// Jump to a position, bypassing the scroll lock. Stops any animation.
    pub fn set_scroll_y(&mut self, scroll_y: f64) {
        self.animator.set_scroll(scroll_y);
        self.scroll_y = scroll_y;
    }

    /// User scroll gesture. Returns false when the page is scroll locked.
    pub fn user_scroll_to(&mut self, scroll_y: f64) -> bool {
        if self.scroll_locked {
            trace!(scroll_y, "Scroll locked, ignoring user scroll");
            return false;
        }
        self.set_scroll_y(scroll_y.clamp(0.0, self.max_scroll()));
        true
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = ViewportSize { width, height };
    }

    pub fn viewport(&self) -> ViewportSnapshot {
        ViewportSnapshot::capture(self)
    }

    pub fn max_scroll(&self) -> f64 {
        (self.document_height.unwrap_or(0.0) - self.viewport.height).max(0.0)
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn attribute(&self, element: &ElementId, name: &str) -> Option<&str> {
        self.element(element)?.attributes.get(name).map(String::as_str)
    }

    pub fn style(&self, element: &ElementId, property: &str) -> Option<&str> {
        self.element(element)?.styles.get(property).map(String::as_str)
    }

    pub fn root_style(&self, property: &str) -> Option<&str> {
        self.root_styles.get(property).map(String::as_str)
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    /// Handle to pass to `Capability::native`
    pub fn observer_backend(&self) -> GeometryObserver {
        self.observer.clone()
    }

    /// Entries for observed elements whose visibility changed
    pub fn take_intersections(&self) -> Vec<IntersectionEntry> {
        self.observer.take_entries(self, &self.viewport())
    }

    /// Images whose source failed to load since the last call
    pub fn take_failed_loads(&mut self) -> Vec<ElementId> {
        std::mem::take(&mut self.failed_loads)
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    /// Advance a running smooth scroll. Returns true when the position moved.
    pub fn advance_frame(&mut self, now: Instant) -> bool {
        if !self.animator.is_animating() {
            return false;
        }
        let previous = self.scroll_y;
        self.scroll_y = self.animator.update(now);
        (self.scroll_y - previous).abs() > f64::EPSILON
    }

    fn element(&self, id: &ElementId) -> Option<&SimElement> {
        self.elements.iter().find(|e| &e.id == id)
    }

    fn element_mut(&mut self, id: &ElementId) -> Option<&mut SimElement> {
        self.elements.iter_mut().find(|e| &e.id == id)
    }
}

impl ViewportTracker for SimulatedPage {
    fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn viewport_height(&self) -> f64 {
        self.viewport.height
    }

    fn viewport_width(&self) -> f64 {
        self.viewport.width
    }
}

impl Markup for SimulatedPage {
    fn find(&self, role: Role) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|e| e.role == Some(role))
            .map(|e| e.id.clone())
    }

    fn element_by_id(&self, id: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|e| e.id.as_str() == id)
            .map(|e| e.id.clone())
    }

    fn sections(&self) -> Vec<Section> {
        // Sections are the blocks with geometry that a navigation link may target
        self.elements
            .iter()
            .filter(|e| e.kind == Kind::Block && e.role.is_none() && e.classes.is_empty())
            .filter_map(|e| {
                let rect = e.rect?;
                Some(Section::new(e.id.as_str(), rect.top, rect.height))
            })
            .collect()
    }

    fn nav_links(&self) -> Vec<NavLink> {
        self.elements
            .iter()
            .filter(|e| e.kind == Kind::NavLink)
            .filter_map(|e| {
                Some(NavLink {
                    element: e.id.clone(),
                    href: e.attributes.get("href")?.clone(),
                })
            })
            .collect()
    }

    fn lazy_images(&self) -> Vec<LazyImage> {
        self.elements
            .iter()
            .filter(|e| e.kind == Kind::Image)
            .filter_map(|e| {
                Some(LazyImage {
                    element: e.id.clone(),
                    pending_src: e.attributes.get("data-src")?.clone(),
                })
            })
            .collect()
    }

    fn query_all(&self, selector: &str) -> Vec<ElementId> {
        let selector = selector.trim();
        let matches = |e: &&SimElement| {
            if let Some(class) = selector.strip_prefix('.') {
                e.classes.iter().any(|c| c == class)
            } else if let Some(id) = selector.strip_prefix('#') {
                e.id.as_str() == id
            } else {
                false
            }
        };
        self.elements.iter().filter(matches).map(|e| e.id.clone()).collect()
    }

    fn geometry(&self, element: &ElementId) -> Option<Rect> {
        self.element(element)?.rect
    }

    fn image_source(&self, element: &ElementId) -> Option<String> {
        self.element(element)?.src.clone()
    }

    fn has_marker(&self, element: &ElementId, marker: Marker) -> bool {
        self.element(element)
            .is_some_and(|e| e.markers.contains(&marker))
    }
}

impl Presentation for SimulatedPage {
    fn add_marker(&mut self, element: &ElementId, marker: Marker) {
        self.mutations.push(Mutation::AddMarker {
            element: element.clone(),
            marker,
        });
        if let Some(e) = self.element_mut(element) {
            e.markers.insert(marker);
        }
    }

    fn remove_marker(&mut self, element: &ElementId, marker: Marker) {
        self.mutations.push(Mutation::RemoveMarker {
            element: element.clone(),
            marker,
        });
        if let Some(e) = self.element_mut(element) {
            e.markers.remove(&marker);
        }
    }

    fn set_attribute(&mut self, element: &ElementId, name: &str, value: Option<&str>) {
        self.mutations.push(Mutation::SetAttribute {
            element: element.clone(),
            name: name.to_string(),
            value: value.map(String::from),
        });
        if let Some(e) = self.element_mut(element) {
            match value {
                Some(value) => e.attributes.insert(name.to_string(), value.to_string()),
                None => e.attributes.remove(name),
            };
        }
    }

    fn set_image_source(&mut self, element: &ElementId, src: &str) {
        self.mutations.push(Mutation::SetSource {
            element: element.clone(),
            src: src.to_string(),
        });
        let broken = self.broken_sources.contains(src);
        if let Some(e) = self.element_mut(element) {
            e.src = Some(src.to_string());
            if broken {
                self.failed_loads.push(element.clone());
            }
        }
    }

    fn set_style(&mut self, element: Option<&ElementId>, property: &str, value: Option<&str>) {
        self.mutations.push(Mutation::SetStyle {
            element: element.cloned(),
            property: property.to_string(),
            value: value.map(String::from),
        });
        let styles = match element {
            Some(id) => match self.element_mut(id) {
                Some(e) => &mut e.styles,
                None => return,
            },
            None => &mut self.root_styles,
        };
        match value {
            Some(value) => styles.insert(property.to_string(), value.to_string()),
            None => styles.remove(property),
        };
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        self.mutations.push(Mutation::ScrollLock { locked });
        self.scroll_locked = locked;
    }

    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior) {
        self.mutations.push(Mutation::ScrollTo { top, behavior });
        let max_scroll = self.max_scroll();
        match behavior {
            ScrollBehavior::Instant => {
                let top = top.clamp(0.0, max_scroll);
                self.set_scroll_y(top);
            }
            ScrollBehavior::Smooth => {
                if !self.animator.is_animating() {
                    self.animator.set_scroll(self.scroll_y);
                }
                self.animator.scroll_to(top, max_scroll);
                if !self.animator.is_animating() {
                    self.scroll_y = self.animator.current_scroll();
                }
            }
        }
    }
}

/// Host input replayed against a simulated page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    DomReady,
    Load,
    Scroll { y: f64 },
    Resize { width: f64, height: f64 },
    /// Activation of a link with the given href
    Click { href: String },
    ToggleMenu,
    BackToTop,
    Key { key: String },
    MouseDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedInput {
    /// Offset from the start of the replay
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: InputEvent,
}

/// Page layout plus a timeline of inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layout: PageLayout,
    #[serde(default)]
    pub events: Vec<TimedInput>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Total replay length
    pub fn duration_ms(&self) -> u64 {
        self.events.last().map_or(0, |e| e.at_ms)
    }

    fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        for pair in self.events.windows(2) {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(Error::Scenario(format!(
                    "events out of order: {}ms after {}ms",
                    pair[1].at_ms, pair[0].at_ms
                )));
            }
        }
        Ok(())
    }
}
