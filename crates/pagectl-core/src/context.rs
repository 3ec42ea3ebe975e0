//! Page controller context.
//!
//! `PageContext` owns every piece of controller state and is the single entry
//! point hosts feed events into. It never fails: absent markup turns the
//! affected feature into a no-op.

use tracing::{debug, info};
use web_time::Instant;

use crate::a11y::Accessibility;
use crate::config::PageConfig;
use crate::dom::{ElementId, Host};
use crate::images::ImageLoader;
use crate::loader::PageLoader;
use crate::menu::{MenuState, MenuStateMachine};
use crate::navigation::SmoothScrollNavigator;
use crate::rate_limit::{DebounceTimer, ThrottleGate};
use crate::reveal::RevealAnimator;
use crate::scroll::{ScrollState, ScrollStateReconciler};
use crate::viewport::ViewportSnapshot;
use crate::visibility::{
    Capability, Consumer, IntersectionEntry, Notification, ObserveOptions, TriggerPolicy,
    VisibilityObserver,
};

/// Clickable controls the controller reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    Anchor { href: String },
    NavToggle,
    BackToTop,
}

/// Host events, delivered in the order they happen
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    DomReady,
    /// Window load (all resources fetched)
    Load,
    Scroll,
    Resize,
    Click(ClickTarget),
    ImageError(ElementId),
    /// Entries reported by the native visibility backend
    Intersections(Vec<IntersectionEntry>),
    KeyDown(String),
    MouseDown,
}

/// What the host must do with the originating DOM event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub prevent_default: bool,
}

pub struct PageContext {
    config: PageConfig,
    started: bool,
    fast_scroll: ThrottleGate,
    slow_scroll: ThrottleGate,
    resize: DebounceTimer<()>,
    reconciler: ScrollStateReconciler,
    menu: MenuStateMachine,
    navigator: SmoothScrollNavigator,
    visibility: VisibilityObserver,
    images: ImageLoader,
    reveal: RevealAnimator,
    loader: PageLoader,
    a11y: Accessibility,
}

impl PageContext {
    pub fn new(config: PageConfig, capability: Capability) -> Self {
        Self {
            started: false,
            fast_scroll: ThrottleGate::new(config.rate.fast_scroll()),
            slow_scroll: ThrottleGate::new(config.rate.slow_scroll()),
            resize: DebounceTimer::new(config.rate.resize_debounce(), false),
            reconciler: ScrollStateReconciler::new(config.scroll.clone()),
            menu: MenuStateMachine::new(&config.menu),
            navigator: SmoothScrollNavigator::new(&config.navigation),
            visibility: VisibilityObserver::new(capability),
            images: ImageLoader::new(&config.images),
            reveal: RevealAnimator::new(&config.reveal),
            loader: PageLoader::new(&config.loader),
            a11y: Accessibility::new(),
            config,
        }
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn scroll_state(&self) -> &ScrollState {
        self.reconciler.state()
    }

    pub fn menu_state(&self) -> MenuState {
        self.menu.state()
    }

    pub fn visibility(&self) -> &VisibilityObserver {
        &self.visibility
    }

    pub fn reveal(&self) -> &RevealAnimator {
        &self.reveal
    }

    /// One-time setup once the document is interactive
    pub fn start(&mut self, host: &mut impl Host, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        info!(degraded = self.visibility.is_degraded(), "Page controller started");

        self.a11y.update_viewport_unit(host);
        self.loader.start(&*host, now);

        for image in host.lazy_images() {
            let fired = self.visibility.observe(
                image.element,
                ObserveOptions::default(),
                Consumer::LazyImage,
                TriggerPolicy::Once,
            );
            if let Some(notification) = fired {
                self.notify(notification, host);
            }
        }

        self.reconciler.on_scroll_tick(host);
    }

    /// Dispatch one event. Elapsed timers fire first.
    pub fn handle(&mut self, event: PageEvent, host: &mut impl Host, now: Instant) -> EventOutcome {
        self.poll_timers(host, now);

        let mut outcome = EventOutcome::default();
        match event {
            PageEvent::DomReady => self.start(host, now),
            PageEvent::Load => self.on_load(host, now),
            PageEvent::Scroll => self.on_scroll(host, now),
            PageEvent::Resize => {
                self.resize.call(now, ());
            }
            PageEvent::Click(ClickTarget::Anchor { href }) => {
                let activation = self.navigator.handle_activation(&href, host, &mut self.menu);
                outcome.prevent_default = activation.prevents_default();
            }
            PageEvent::Click(ClickTarget::NavToggle) => {
                self.menu.toggle(host);
            }
            PageEvent::Click(ClickTarget::BackToTop) => {
                self.navigator.scroll_to_top(host);
                outcome.prevent_default = true;
            }
            PageEvent::ImageError(element) => {
                self.images.handle_error(host, &element);
            }
            PageEvent::Intersections(entries) => {
                for notification in self.visibility.dispatch(&entries) {
                    self.notify(notification, host);
                }
            }
            PageEvent::KeyDown(key) => self.a11y.on_key_down(&key, host),
            PageEvent::MouseDown => self.a11y.on_mouse_down(host),
        }
        outcome
    }

    /// Earliest pending timer, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.resize.deadline(), self.loader.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fire every timer whose deadline is at or before `now`
    pub fn poll_timers(&mut self, host: &mut impl Host, now: Instant) {
        if self.resize.poll(now).is_some() {
            let width = host.viewport_width();
            debug!(width, "Resize settled");
            self.menu.on_resize(width, host);
            self.a11y.update_viewport_unit(host);
        }
        self.loader.poll(host, now);
    }

    fn on_load(&mut self, host: &mut impl Host, now: Instant) {
        self.start(host, now);
        self.loader.on_load(host, now);

        let options = self.reveal.observe_options();
        for element in self.reveal.prepare(host) {
            let fired = self
                .visibility
                .observe(element, options, Consumer::Reveal, TriggerPolicy::Once);
            if let Some(notification) = fired {
                self.notify(notification, host);
            }
        }
    }

    fn on_scroll(&mut self, host: &mut impl Host, now: Instant) {
        if self.fast_scroll.try_acquire(now) {
            self.reconciler.on_fast_tick(host);
            let viewport = ViewportSnapshot::capture(&*host);
            self.reveal.poll_fallback(host, &viewport);
        }
        if self.slow_scroll.try_acquire(now) {
            self.reconciler.on_slow_tick(host);
        }
    }

    fn notify(&mut self, notification: Notification, host: &mut impl Host) {
        match notification.consumer {
            Consumer::LazyImage => {
                self.images.promote(host, &notification.target);
            }
            Consumer::Reveal => {
                self.reveal.activate(host, &notification.target);
            }
        }
    }
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("started", &self.started)
            .field("scroll", self.reconciler.state())
            .field("menu", &self.menu.state())
            .field("visibility", &self.visibility)
            .field("loader", &self.loader.phase())
            .finish_non_exhaustive()
    }
}
