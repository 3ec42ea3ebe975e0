use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use pagectl_core::dom::{LazyImage, NavLink, Rect, ScrollBehavior, Section};
use pagectl_core::visibility::{Consumer, IntersectionEntry, ObserveOptions, ObserverBackend};
use pagectl_core::{
    Capability, ClickTarget, ElementId, EventOutcome, Marker, Markup, PageConfig, PageContext,
    PageEvent, Presentation, Role, ViewportTracker,
};
use tracing::{debug, info, trace, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Document, Element, Event, EventTarget, HtmlElement, HtmlImageElement,
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, KeyboardEvent,
    ScrollToOptions, Window,
};
use web_time::Instant;

use crate::{role_selector, IN_PAGE_ANCHOR_SELECTOR};

/// Maps DOM elements to stable `ElementId`s. Elements with an `id`
/// attribute use it; the rest get a synthetic `@<n>` key.
#[derive(Clone)]
struct Elements {
    document: Document,
    anonymous: Rc<RefCell<Vec<Element>>>,
}

impl Elements {
    fn new(document: Document) -> Self {
        Self {
            document,
            anonymous: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn id_of(&self, element: &Element) -> ElementId {
        let id = element.id();
        if !id.is_empty() {
            return ElementId::new(id);
        }
        let mut anonymous = self.anonymous.borrow_mut();
        let index = match anonymous.iter().position(|known| known == element) {
            Some(index) => index,
            None => {
                anonymous.push(element.clone());
                anonymous.len() - 1
            }
        };
        ElementId::new(format!("@{index}"))
    }

    fn resolve(&self, id: &ElementId) -> Option<Element> {
        if let Some(index) = id.as_str().strip_prefix('@').and_then(|n| n.parse::<usize>().ok()) {
            return self.anonymous.borrow().get(index).cloned();
        }
        self.document.get_element_by_id(id.as_str())
    }

    fn query(&self, selector: &str) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(selector) else {
            trace!(selector, "Invalid selector");
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

/// `web-sys` implementation of the host traits
pub struct WebHost {
    window: Window,
    elements: Elements,
}

impl WebHost {
    fn new(window: Window, elements: Elements) -> Self {
        Self { window, elements }
    }

    fn document(&self) -> &Document {
        &self.elements.document
    }

    fn role_element(&self, role: Role) -> Option<Element> {
        match role {
            Role::Body => self.document().body().map(Into::into),
            _ => self.document().query_selector(role_selector(role)).ok().flatten(),
        }
    }

    fn html_element(&self, id: &ElementId) -> Option<HtmlElement> {
        self.elements.resolve(id)?.dyn_into::<HtmlElement>().ok()
    }

    /// Document-relative rectangle
    fn rect_of(&self, element: &Element) -> Rect {
        let rect = element.get_bounding_client_rect();
        Rect::new(rect.y() + self.scroll_y(), rect.height())
    }
}

impl ViewportTracker for WebHost {
    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn viewport_height(&self) -> f64 {
        self.window
            .inner_height()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    fn viewport_width(&self) -> f64 {
        self.window
            .inner_width()
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }
}

impl Markup for WebHost {
    fn find(&self, role: Role) -> Option<ElementId> {
        self.role_element(role).map(|e| self.elements.id_of(&e))
    }

    fn element_by_id(&self, id: &str) -> Option<ElementId> {
        self.document()
            .get_element_by_id(id)
            .map(|_| ElementId::new(id))
    }

    fn sections(&self) -> Vec<Section> {
        self.elements
            .query("section[id]")
            .iter()
            .map(|section| {
                let rect = self.rect_of(section);
                Section::new(section.id(), rect.top, rect.height)
            })
            .collect()
    }

    fn nav_links(&self) -> Vec<NavLink> {
        self.elements
            .query(".nav-link")
            .iter()
            .filter_map(|link| {
                Some(NavLink {
                    href: link.get_attribute("href")?,
                    element: self.elements.id_of(link),
                })
            })
            .collect()
    }

    fn lazy_images(&self) -> Vec<LazyImage> {
        self.elements
            .query("img[data-src]")
            .iter()
            .filter_map(|image| {
                Some(LazyImage {
                    pending_src: image.get_attribute("data-src")?,
                    element: self.elements.id_of(image),
                })
            })
            .collect()
    }

    fn query_all(&self, selector: &str) -> Vec<ElementId> {
        self.elements
            .query(selector)
            .iter()
            .map(|e| self.elements.id_of(e))
            .collect()
    }

    fn geometry(&self, element: &ElementId) -> Option<Rect> {
        self.elements.resolve(element).map(|e| self.rect_of(&e))
    }

    fn image_source(&self, element: &ElementId) -> Option<String> {
        let element = self.elements.resolve(element)?;
        match element.dyn_ref::<HtmlImageElement>() {
            Some(image) => Some(image.src()),
            None => element.get_attribute("src"),
        }
    }

    fn has_marker(&self, element: &ElementId, marker: Marker) -> bool {
        self.elements
            .resolve(element)
            .is_some_and(|e| e.class_list().contains(marker.class_name()))
    }
}

impl Presentation for WebHost {
    fn add_marker(&mut self, element: &ElementId, marker: Marker) {
        if let Some(e) = self.elements.resolve(element) {
            if let Err(err) = e.class_list().add_1(marker.class_name()) {
                trace!(%element, ?err, "Failed to add class");
            }
        }
    }

    fn remove_marker(&mut self, element: &ElementId, marker: Marker) {
        if let Some(e) = self.elements.resolve(element) {
            if let Err(err) = e.class_list().remove_1(marker.class_name()) {
                trace!(%element, ?err, "Failed to remove class");
            }
        }
    }

    fn set_attribute(&mut self, element: &ElementId, name: &str, value: Option<&str>) {
        let Some(e) = self.elements.resolve(element) else {
            return;
        };
        let result = match value {
            Some(value) => e.set_attribute(name, value),
            None => e.remove_attribute(name),
        };
        if let Err(err) = result {
            trace!(%element, name, ?err, "Failed to update attribute");
        }
    }

    fn set_image_source(&mut self, element: &ElementId, src: &str) {
        let Some(e) = self.elements.resolve(element) else {
            return;
        };
        match e.dyn_ref::<HtmlImageElement>() {
            Some(image) => image.set_src(src),
            None => {
                let _ = e.set_attribute("src", src);
            }
        }
    }

    fn set_style(&mut self, element: Option<&ElementId>, property: &str, value: Option<&str>) {
        let target = match element {
            Some(id) => self.html_element(id),
            None => self
                .document()
                .document_element()
                .and_then(|root| root.dyn_into::<HtmlElement>().ok()),
        };
        let Some(target) = target else {
            return;
        };
        let style = target.style();
        let result = match value {
            Some(value) => style.set_property(property, value),
            None => style.remove_property(property).map(|_| ()),
        };
        if let Err(err) = result {
            trace!(property, ?err, "Failed to update style");
        }
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        let Some(body) = self.document().body() else {
            return;
        };
        let style = body.style();
        let result = if locked {
            style.set_property("overflow", "hidden")
        } else {
            style.remove_property("overflow").map(|_| ())
        };
        if let Err(err) = result {
            trace!(locked, ?err, "Failed to toggle scroll lock");
        }
    }

    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior) {
        let options = ScrollToOptions::new();
        options.set_top(top);
        options.set_behavior(match behavior {
            ScrollBehavior::Smooth => web_sys::ScrollBehavior::Smooth,
            ScrollBehavior::Instant => web_sys::ScrollBehavior::Instant,
        });
        self.window.scroll_to_with_scroll_to_options(&options);
    }
}

type IntersectionCallback = Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>;

/// Browser observer serving one consumer with one option set
struct ConsumerObserver {
    observer: IntersectionObserver,
    _callback: IntersectionCallback,
}

/// Native visibility backend. Every consumer gets its own browser observers,
/// so one element can be watched by several features at once.
struct BrowserObserver {
    elements: Elements,
    controller: Weak<RefCell<Inner>>,
    observers: BTreeMap<(Consumer, String), ConsumerObserver>,
    observed: BTreeMap<(ElementId, Consumer), String>,
}

impl BrowserObserver {
    fn new(elements: Elements, controller: Weak<RefCell<Inner>>) -> Self {
        Self {
            elements,
            controller,
            observers: BTreeMap::new(),
            observed: BTreeMap::new(),
        }
    }

    fn callback(&self, consumer: Consumer) -> IntersectionCallback {
        let resolver = self.elements.clone();
        let controller = self.controller.clone();
        Closure::new(move |entries: js_sys::Array, _observer: IntersectionObserver| {
            let entries: Vec<IntersectionEntry> = entries
                .iter()
                .filter_map(|value| value.dyn_into::<IntersectionObserverEntry>().ok())
                .map(|entry| IntersectionEntry {
                    target: resolver.id_of(&entry.target()),
                    consumer,
                    ratio: entry.intersection_ratio(),
                    is_intersecting: entry.is_intersecting(),
                })
                .collect();
            with_inner(&controller, |inner| {
                inner.dispatch(PageEvent::Intersections(entries));
            });
        })
    }

    fn observer_for(&mut self, consumer: Consumer, options: &ObserveOptions) -> Option<(String, IntersectionObserver)> {
        let key = format!("{}|{}", options.threshold, options.root_margin);
        if let Some(entry) = self.observers.get(&(consumer, key.clone())) {
            return Some((key, entry.observer.clone()));
        }

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold));
        init.set_root_margin(&options.root_margin.to_string());
        let callback = self.callback(consumer);
        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                self.observers.insert(
                    (consumer, key.clone()),
                    ConsumerObserver {
                        observer: observer.clone(),
                        _callback: callback,
                    },
                );
                Some((key, observer))
            }
            Err(err) => {
                warn!(?err, ?consumer, "Failed to create IntersectionObserver");
                None
            }
        }
    }

    fn detach(&self, element: &Element, consumer: Consumer, key: String) {
        if let Some(entry) = self.observers.get(&(consumer, key)) {
            entry.observer.unobserve(element);
        }
    }
}

impl ObserverBackend for BrowserObserver {
    fn observe(&mut self, target: &ElementId, consumer: Consumer, options: &ObserveOptions) {
        let Some(element) = self.elements.resolve(target) else {
            trace!(element = %target, "Observed element vanished");
            return;
        };
        let Some((key, observer)) = self.observer_for(consumer, options) else {
            return;
        };

        // New options for the same consumer move the element between observers
        if let Some(previous) = self.observed.insert((target.clone(), consumer), key.clone()) {
            if previous != key {
                self.detach(&element, consumer, previous);
            }
        }
        observer.observe(&element);
    }

    fn unobserve(&mut self, target: &ElementId, consumer: Consumer) {
        let Some(key) = self.observed.remove(&(target.clone(), consumer)) else {
            return;
        };
        if let Some(element) = self.elements.resolve(target) {
            self.detach(&element, consumer, key);
        }
    }
}

impl Drop for BrowserObserver {
    fn drop(&mut self) {
        for entry in self.observers.values() {
            entry.observer.disconnect();
        }
    }
}

struct Listener {
    target: EventTarget,
    kind: &'static str,
    capture: bool,
    closure: Closure<dyn FnMut(Event)>,
}

struct Inner {
    context: PageContext,
    host: WebHost,
    timer: Option<i32>,
    timer_callback: Option<Closure<dyn FnMut()>>,
    listeners: Vec<Listener>,
}

impl Inner {
    fn dispatch(&mut self, event: PageEvent) -> EventOutcome {
        let now = Instant::now();
        let outcome = self.context.handle(event, &mut self.host, now);
        self.reschedule(now);
        outcome
    }

    fn on_timer(&mut self) {
        self.timer = None;
        let now = Instant::now();
        self.context.poll_timers(&mut self.host, now);
        self.reschedule(now);
    }

    /// Keep exactly one browser timeout armed for the earliest deadline
    fn reschedule(&mut self, now: Instant) {
        if let Some(handle) = self.timer.take() {
            self.host.window.clear_timeout_with_handle(handle);
        }
        let (Some(deadline), Some(callback)) = (self.context.next_deadline(), &self.timer_callback) else {
            return;
        };
        let delay = deadline
            .saturating_duration_since(now)
            .as_millis()
            .min(i32::MAX as u128) as i32;
        match self
            .host
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay)
        {
            Ok(handle) => self.timer = Some(handle),
            Err(err) => warn!(?err, "Failed to arm timer"),
        }
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.host.window.clear_timeout_with_handle(handle);
        }
        for listener in self.listeners.drain(..) {
            let _ = listener.target.remove_event_listener_with_callback_and_bool(
                listener.kind,
                listener.closure.as_ref().unchecked_ref(),
                listener.capture,
            );
        }
        self.timer_callback = None;
    }
}

fn with_inner(controller: &Weak<RefCell<Inner>>, f: impl FnOnce(&mut Inner)) {
    let Some(inner) = controller.upgrade() else {
        return;
    };
    match inner.try_borrow_mut() {
        Ok(mut inner) => f(&mut inner),
        Err(_) => warn!("Re-entrant page event dropped"),
    };
}

fn listen(
    target: &EventTarget,
    kind: &'static str,
    capture: bool,
    passive: bool,
    controller: &Weak<RefCell<Inner>>,
    handler: fn(&mut Inner, &Event),
) -> Result<Listener, JsValue> {
    let controller = controller.clone();
    let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        with_inner(&controller, |inner| handler(inner, &event));
    });

    let options = AddEventListenerOptions::new();
    options.set_capture(capture);
    options.set_passive(passive);
    target.add_event_listener_with_callback_and_add_event_listener_options(
        kind,
        closure.as_ref().unchecked_ref(),
        &options,
    )?;

    Ok(Listener {
        target: target.clone(),
        kind,
        capture,
        closure,
    })
}

fn on_click(inner: &mut Inner, event: &Event) {
    let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
        return;
    };
    let within = |selector: &str| target.closest(selector).ok().flatten();

    let click = if within(role_selector(Role::NavToggle)).is_some() {
        ClickTarget::NavToggle
    } else if within(role_selector(Role::BackToTop)).is_some() {
        ClickTarget::BackToTop
    } else if let Some(anchor) = within(IN_PAGE_ANCHOR_SELECTOR) {
        let Some(href) = anchor.get_attribute("href") else {
            return;
        };
        ClickTarget::Anchor { href }
    } else {
        return;
    };

    if inner.dispatch(PageEvent::Click(click)).prevent_default {
        event.prevent_default();
    }
}

fn on_image_error(inner: &mut Inner, event: &Event) {
    let Some(image) = event
        .target()
        .and_then(|t| t.dyn_into::<HtmlImageElement>().ok())
    else {
        return;
    };
    let element = inner.host.elements.id_of(&image);
    inner.dispatch(PageEvent::ImageError(element));
}

fn on_key_down(inner: &mut Inner, event: &Event) {
    if let Some(key) = event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key) {
        inner.dispatch(PageEvent::KeyDown(key));
    }
}

/// JS-facing controller. Construct once per page; call `destroy` to detach.
#[wasm_bindgen]
pub struct PageController {
    inner: Rc<RefCell<Inner>>,
}

#[wasm_bindgen]
impl PageController {
    /// `config` is optional TOML text overriding the defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<PageController, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let mut config = match config {
            Some(text) => PageConfig::from_toml_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))?,
            None => PageConfig::default(),
        };
        if config.images.base_url.is_none() {
            config.images.base_url = document.base_uri().ok().flatten();
        }

        let native = js_sys::Reflect::has(&window, &JsValue::from_str("IntersectionObserver")).unwrap_or(false);
        let elements = Elements::new(document.clone());

        let inner = Rc::new_cyclic(|controller: &Weak<RefCell<Inner>>| {
            let capability = if native {
                Capability::native(BrowserObserver::new(elements.clone(), controller.clone()))
            } else {
                Capability::Degraded
            };
            RefCell::new(Inner {
                context: PageContext::new(config, capability),
                host: WebHost::new(window.clone(), elements),
                timer: None,
                timer_callback: None,
                listeners: Vec::new(),
            })
        });

        let controller = Rc::downgrade(&inner);
        let timer_controller = controller.clone();
        let timer_callback = Closure::<dyn FnMut()>::new(move || {
            with_inner(&timer_controller, Inner::on_timer);
        });

        let window_target: &EventTarget = window.as_ref();
        let document_target: &EventTarget = document.as_ref();
        let listeners = vec![
            listen(document_target, "DOMContentLoaded", false, false, &controller, |inner, _| {
                inner.dispatch(PageEvent::DomReady);
            })?,
            listen(window_target, "load", false, false, &controller, |inner, _| {
                inner.dispatch(PageEvent::Load);
            })?,
            listen(window_target, "scroll", false, true, &controller, |inner, _| {
                inner.dispatch(PageEvent::Scroll);
            })?,
            listen(window_target, "resize", false, true, &controller, |inner, _| {
                inner.dispatch(PageEvent::Resize);
            })?,
            listen(document_target, "click", false, false, &controller, on_click)?,
            // Load errors do not bubble; catch them on the way down
            listen(document_target, "error", true, false, &controller, on_image_error)?,
            listen(document_target, "keydown", false, false, &controller, on_key_down)?,
            listen(document_target, "mousedown", false, true, &controller, |inner, _| {
                inner.dispatch(PageEvent::MouseDown);
            })?,
        ];

        {
            let mut state = inner.borrow_mut();
            state.timer_callback = Some(timer_callback);
            state.listeners = listeners;

            // Script may run after either lifecycle event already happened
            let ready_state = document.ready_state();
            if ready_state != "loading" {
                state.dispatch(PageEvent::DomReady);
            }
            if ready_state == "complete" {
                state.dispatch(PageEvent::Load);
            }
        }

        info!(native_visibility = native, "Page controller attached");
        Ok(PageController { inner })
    }

    /// Id of the section whose navigation link is active
    #[wasm_bindgen(js_name = activeSection)]
    pub fn active_section(&self) -> Option<String> {
        self.inner.borrow().context.scroll_state().active_section_id.clone()
    }

    #[wasm_bindgen(js_name = isMenuOpen)]
    pub fn is_menu_open(&self) -> bool {
        self.inner.borrow().context.menu_state() == pagectl_core::menu::MenuState::Open
    }

    #[wasm_bindgen(js_name = isDegraded)]
    pub fn is_degraded(&self) -> bool {
        self.inner.borrow().context.visibility().is_degraded()
    }

    /// Detach every listener and timer
    pub fn destroy(&mut self) {
        match self.inner.try_borrow_mut() {
            Ok(mut inner) => {
                inner.teardown();
                debug!("Page controller detached");
            }
            Err(_) => warn!("Controller busy, destroy skipped"),
        }
    }
}

impl Drop for PageController {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.teardown();
        }
    }
}
