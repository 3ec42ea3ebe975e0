//! Event loop that drives a `PageContext` against a host on a tokio runtime.
//!
//! The loop multiplexes host input, the context's next timer deadline,
//! animation frames while a smooth scroll runs, and a shutdown signal.
//! Everything runs on the calling task, so non-`Send` hosts are fine.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use web_time::Instant;

use crate::context::{ClickTarget, EventOutcome, PageContext, PageEvent};
use crate::dom::{ElementId, Host};
use crate::sim::{InputEvent, SimulatedPage};
use crate::visibility::IntersectionEntry;

/// Follow-up rounds (intersections, image failures) allowed per event
const MAX_FOLLOW_UP_ROUNDS: usize = 8;

/// Host that can be driven by `PageDriver`
pub trait DrivenHost: Host {
    /// Apply raw input to the host and translate it into a page event.
    /// `None` when the input has no effect (e.g. scrolling a locked page).
    fn apply_input(&mut self, input: &InputEvent) -> Option<PageEvent>;

    /// Step a running smooth scroll; true when the position moved
    fn advance_frame(&mut self, now: Instant) -> bool;

    fn is_animating(&self) -> bool;

    fn take_intersections(&mut self) -> Vec<IntersectionEntry>;

    fn take_failed_loads(&mut self) -> Vec<ElementId>;
}

impl DrivenHost for SimulatedPage {
    fn apply_input(&mut self, input: &InputEvent) -> Option<PageEvent> {
        let event = match input {
            InputEvent::DomReady => PageEvent::DomReady,
            InputEvent::Load => PageEvent::Load,
            InputEvent::Scroll { y } => {
                if !self.user_scroll_to(*y) {
                    return None;
                }
                PageEvent::Scroll
            }
            InputEvent::Resize { width, height } => {
                self.set_viewport(*width, *height);
                PageEvent::Resize
            }
            InputEvent::Click { href } => PageEvent::Click(ClickTarget::Anchor { href: href.clone() }),
            InputEvent::ToggleMenu => PageEvent::Click(ClickTarget::NavToggle),
            InputEvent::BackToTop => PageEvent::Click(ClickTarget::BackToTop),
            InputEvent::Key { key } => PageEvent::KeyDown(key.clone()),
            InputEvent::MouseDown => PageEvent::MouseDown,
        };
        Some(event)
    }

    fn advance_frame(&mut self, now: Instant) -> bool {
        SimulatedPage::advance_frame(self, now)
    }

    fn is_animating(&self) -> bool {
        SimulatedPage::is_animating(self)
    }

    fn take_intersections(&mut self) -> Vec<IntersectionEntry> {
        SimulatedPage::take_intersections(self)
    }

    fn take_failed_loads(&mut self) -> Vec<ElementId> {
        SimulatedPage::take_failed_loads(self)
    }
}

/// Maps tokio time (pausable in tests) onto controller instants
#[derive(Debug, Clone, Copy)]
struct Clock {
    tokio_origin: tokio::time::Instant,
    origin: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            tokio_origin: tokio::time::Instant::now(),
            origin: Instant::now(),
        }
    }

    fn now(&self) -> Instant {
        self.origin + self.tokio_origin.elapsed()
    }

    fn to_tokio(self, at: Instant) -> tokio::time::Instant {
        self.tokio_origin + at.saturating_duration_since(self.origin)
    }
}

pub struct PageDriver<H> {
    context: PageContext,
    host: H,
    frame_interval: Duration,
}

impl<H: DrivenHost> PageDriver<H> {
    pub fn new(context: PageContext, host: H) -> Self {
        Self {
            context,
            host,
            frame_interval: Duration::from_millis(16),
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_parts(self) -> (PageContext, H) {
        (self.context, self.host)
    }

    /// Run until shutdown, or until the input channel closed and no timer or
    /// animation is left
    pub async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<InputEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let clock = Clock::start();
        let mut inputs_open = true;
        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(frame_ms = self.frame_interval.as_millis() as u64, "Page driver started");

        loop {
            let deadline = self.context.next_deadline().map(|at| clock.to_tokio(at));
            let animating = self.host.is_animating();

            if !inputs_open && deadline.is_none() && !animating {
                debug!("Inputs drained and nothing pending");
                break;
            }

            tokio::select! {
                // A dropped sender counts as shutdown
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Page driver received shutdown signal");
                        break;
                    }
                }

                input = inputs.recv(), if inputs_open => {
                    match input {
                        Some(input) => self.feed(&input, clock.now()),
                        None => {
                            debug!("Input channel closed");
                            inputs_open = false;
                        }
                    }
                }

                _ = sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)), if deadline.is_some() => {
                    let now = clock.now();
                    self.context.poll_timers(&mut self.host, now);
                    self.follow_up(now);
                }

                _ = frames.tick(), if animating => {
                    let now = clock.now();
                    if self.host.advance_frame(now) {
                        self.dispatch(PageEvent::Scroll, now);
                    }
                }
            }
        }

        self
    }

    /// Apply one input immediately
    pub fn feed(&mut self, input: &InputEvent, now: Instant) {
        trace!(?input, "Input");
        match self.host.apply_input(input) {
            Some(event) => {
                let outcome = self.dispatch(event, now);
                if outcome.prevent_default {
                    trace!("Default action suppressed");
                }
            }
            None => trace!(?input, "Input had no effect"),
        }
    }

    fn dispatch(&mut self, event: PageEvent, now: Instant) -> EventOutcome {
        let outcome = self.context.handle(event, &mut self.host, now);
        self.follow_up(now);
        outcome
    }

    /// Deliver events the host produced in reaction to presentation changes
    fn follow_up(&mut self, now: Instant) {
        for _ in 0..MAX_FOLLOW_UP_ROUNDS {
            let entries = self.host.take_intersections();
            let failed = self.host.take_failed_loads();
            if entries.is_empty() && failed.is_empty() {
                return;
            }

            if !entries.is_empty() {
                self.context
                    .handle(PageEvent::Intersections(entries), &mut self.host, now);
            }
            for element in failed {
                self.context
                    .handle(PageEvent::ImageError(element), &mut self.host, now);
            }
        }
        warn!("Follow-up events did not settle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageConfig;
    use crate::dom::{Markup, Marker, Role};
    use crate::sim::PageLayout;
    use crate::viewport::ViewportTracker;
    use crate::visibility::{Capability, Consumer};

    fn driver(layout: &PageLayout) -> PageDriver<SimulatedPage> {
        let page = SimulatedPage::from_layout(layout);
        let context = PageContext::new(PageConfig::default(), Capability::native(page.observer_backend()));
        PageDriver::new(context, page)
    }

    #[tokio::test(start_paused = true)]
    async fn test_anchor_scroll_animates_and_loader_retires() {
        let layout = PageLayout::builder()
            .section("home", 0.0, 800.0)
            .section("about", 800.0, 1200.0)
            .build();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(InputEvent::DomReady).unwrap();
        tx.send(InputEvent::Load).unwrap();
        tx.send(InputEvent::Click {
            href: "#about".to_string(),
        })
        .unwrap();
        drop(tx);

        let driver = driver(&layout).run(rx, shutdown_rx).await;
        let page = driver.host();

        assert_eq!(page.scroll_y(), 720.0);
        // Frames feed the fast scroll stream
        let back_to_top = page.find(Role::BackToTop).unwrap();
        assert!(page.has_marker(&back_to_top, Marker::Visible));
        let loader = page.find(Role::PageLoader).unwrap();
        assert!(page.has_marker(&loader, Marker::Hidden));
        assert_eq!(page.style(&loader, "display"), Some("none"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_image_promoted_when_scrolled_into_view() {
        let layout = PageLayout::builder()
            .section("home", 0.0, 3000.0)
            .lazy_image("hero", 1500.0, 300.0, "img/hero.png")
            .build();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let feeder = async move {
            tx.send(InputEvent::DomReady).unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(InputEvent::Scroll { y: 1000.0 }).unwrap();
        };
        let (driver, ()) = tokio::join!(driver(&layout).run(rx, shutdown_rx), feeder);

        let hero = ElementId::new("hero");
        assert_eq!(driver.host().image_source(&hero).as_deref(), Some("img/hero.png"));
        assert!(driver.host().has_marker(&hero, Marker::Loaded));
        assert!(!driver.context().visibility().is_observing(&hero, Consumer::LazyImage));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_fallback_does_not_loop() {
        let layout = PageLayout::builder()
            .image("logo", 0.0, 50.0, "img/logo.png")
            .broken_source("img/logo.png")
            .broken_source("img/pageload-spinner.gif")
            .build();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tx.send(InputEvent::DomReady).unwrap();
        drop(tx);

        let driver = driver(&layout).run(rx, shutdown_rx).await;
        let sources: Vec<_> = driver
            .host()
            .mutations()
            .iter()
            .filter(|m| matches!(m, crate::sim::Mutation::SetSource { .. }))
            .collect();
        assert_eq!(sources.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_waiting_driver() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let trigger = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown_tx.send(true).unwrap();
        };
        let (driver, ()) = tokio::join!(
            driver(&PageLayout::default()).run(rx, shutdown_rx),
            trigger
        );
        assert!(!driver.context().is_started());
    }
}
