//! End-to-end behavior of the page controller against the simulated page.

use std::cell::RefCell;
use std::time::Duration;

use pagectl_core::dom::Section;
use pagectl_core::menu::MenuState;
use pagectl_core::rate_limit::{debounce, throttle};
use pagectl_core::scroll::state::active_section;
use pagectl_core::sim::{Mutation, PageLayout, SimulatedPage};
use pagectl_core::visibility::Consumer;
use pagectl_core::{
    Capability, ClickTarget, ElementId, Marker, Markup, PageConfig, PageContext, PageEvent, Role,
};
use web_time::Instant;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn landing_page() -> PageLayout {
    PageLayout::builder()
        .section("home", 0.0, 900.0)
        .section("games", 900.0, 1400.0)
        .section("servers", 2300.0, 1000.0)
        .lazy_image("banner", 2600.0, 400.0, "img/banner.webp")
        .card("g1", "game-card", 1000.0, 300.0)
        .card("g2", "game-card", 1400.0, 300.0)
        .card("s1", "server-card", 2400.0, 300.0)
        .build()
}

fn native_context(page: &SimulatedPage) -> PageContext {
    PageContext::new(PageConfig::default(), Capability::native(page.observer_backend()))
}

/// Deliver whatever the geometry backend reports right now
fn pump_intersections(ctx: &mut PageContext, page: &mut SimulatedPage, now: Instant) {
    let entries = page.take_intersections();
    if !entries.is_empty() {
        ctx.handle(PageEvent::Intersections(entries), page, now);
    }
}

#[test]
fn unchanged_scroll_position_writes_nothing() {
    let mut page = SimulatedPage::from_layout(&landing_page());
    let mut ctx = native_context(&page);
    let t0 = Instant::now();
    ctx.start(&mut page, t0);

    page.set_scroll_y(1200.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(200));
    let writes = page.mutations().len();

    for step in 1..=5 {
        ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(200 + step * 150));
    }
    assert_eq!(page.mutations().len(), writes);
}

#[test]
fn thresholds_are_strict() {
    let mut page = SimulatedPage::from_layout(&landing_page());
    let navbar = page.find(Role::Navbar).unwrap();
    let back_to_top = page.find(Role::BackToTop).unwrap();
    let mut ctx = native_context(&page);
    let t0 = Instant::now();
    ctx.start(&mut page, t0);

    page.set_scroll_y(100.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(20));
    assert!(!page.has_marker(&navbar, Marker::Scrolled));

    page.set_scroll_y(100.5);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(40));
    assert!(page.has_marker(&navbar, Marker::Scrolled));

    page.set_scroll_y(300.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(60));
    assert!(!page.has_marker(&back_to_top, Marker::Visible));

    page.set_scroll_y(301.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(80));
    assert!(page.has_marker(&back_to_top, Marker::Visible));
}

#[test]
fn active_section_uses_lookahead() {
    let sections = [
        Section::new("a", 0.0, 500.0),
        Section::new("b", 500.0, 500.0),
        Section::new("c", 1000.0, 500.0),
    ];
    assert_eq!(active_section(&sections, 650.0, 100.0).map(|s| s.id.as_str()), Some("b"));
    assert_eq!(active_section(&sections, 900.0, 100.0).map(|s| s.id.as_str()), Some("c"));
    assert_eq!(active_section(&sections, 1450.0, 100.0), None);
}

#[test]
fn throttle_coalesces_burst() {
    let runs = RefCell::new(Vec::new());
    let mut throttled = throttle(|at: u64| runs.borrow_mut().push(at), ms(100));
    let t0 = Instant::now();

    for at in [0, 10, 20, 90, 150] {
        throttled.call(t0 + ms(at), at);
    }
    drop(throttled);
    assert_eq!(runs.into_inner(), vec![0, 150]);
}

#[test]
fn debounce_runs_trailing_once() {
    let runs = RefCell::new(Vec::new());
    let mut debounced = debounce(|at: u64| runs.borrow_mut().push(at), ms(50), false);
    let t0 = Instant::now();

    for at in [0, 20, 40] {
        debounced.call(t0 + ms(at), at);
    }
    assert_eq!(debounced.deadline(), Some(t0 + ms(90)));
    assert!(!debounced.poll(t0 + ms(89)));
    assert!(debounced.poll(t0 + ms(90)));
    assert!(!debounced.poll(t0 + ms(500)));
    drop(debounced);
    assert_eq!(runs.into_inner(), vec![40]);
}

#[test]
fn menu_lock_follows_state() {
    let mut page = SimulatedPage::from_layout(&landing_page());
    let mut ctx = native_context(&page);
    let t0 = Instant::now();
    ctx.start(&mut page, t0);
    page.set_viewport(390.0, 844.0);

    ctx.handle(PageEvent::Click(ClickTarget::NavToggle), &mut page, t0);
    assert_eq!(ctx.menu_state(), MenuState::Open);
    assert!(page.is_scroll_locked());

    // In-page navigation closes the menu and releases the lock
    let outcome = ctx.handle(
        PageEvent::Click(ClickTarget::Anchor {
            href: "#servers".to_string(),
        }),
        &mut page,
        t0 + ms(10),
    );
    assert!(outcome.prevent_default);
    assert_eq!(ctx.menu_state(), MenuState::Closed);
    assert!(!page.is_scroll_locked());
    assert!(page.mutations().contains(&Mutation::ScrollTo {
        top: 2220.0,
        behavior: pagectl_core::dom::ScrollBehavior::Smooth,
    }));

    // A narrow resize leaves the closed menu alone
    let writes = page.mutations().len();
    ctx.handle(PageEvent::Resize, &mut page, t0 + ms(20));
    ctx.poll_timers(&mut page, t0 + ms(400));
    let lock_writes = page.mutations()[writes..]
        .iter()
        .filter(|m| matches!(m, Mutation::ScrollLock { .. }))
        .count();
    assert_eq!(lock_writes, 0);
}

#[test]
fn lazy_image_promoted_once() {
    let mut page = SimulatedPage::from_layout(&landing_page());
    let banner = ElementId::new("banner");
    let mut ctx = native_context(&page);
    let t0 = Instant::now();

    ctx.handle(PageEvent::DomReady, &mut page, t0);
    pump_intersections(&mut ctx, &mut page, t0);
    assert_eq!(page.image_source(&banner), None);
    assert!(ctx.visibility().is_observing(&banner, Consumer::LazyImage));

    page.set_scroll_y(2200.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(200));
    pump_intersections(&mut ctx, &mut page, t0 + ms(200));
    assert_eq!(page.image_source(&banner).as_deref(), Some("img/banner.webp"));
    assert!(!ctx.visibility().is_observing(&banner, Consumer::LazyImage));

    // Leaving and re-entering does not promote again
    let promotions = |page: &SimulatedPage| {
        page.mutations()
            .iter()
            .filter(|m| matches!(m, Mutation::SetSource { element, .. } if element.as_str() == "banner"))
            .count()
    };
    page.set_scroll_y(0.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(400));
    pump_intersections(&mut ctx, &mut page, t0 + ms(400));
    page.set_scroll_y(2200.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(600));
    pump_intersections(&mut ctx, &mut page, t0 + ms(600));
    assert_eq!(promotions(&page), 1);
}

#[test]
fn failing_fallback_is_left_alone() {
    let layout = PageLayout::builder()
        .image("avatar", 0.0, 64.0, "img/avatar.png")
        .broken_source("img/avatar.png")
        .broken_source("img/pageload-spinner.gif")
        .build();
    let mut page = SimulatedPage::from_layout(&layout);
    let mut ctx = native_context(&page);
    let t0 = Instant::now();
    ctx.start(&mut page, t0);

    let mut rounds = 0;
    loop {
        let failed = page.take_failed_loads();
        if failed.is_empty() {
            break;
        }
        rounds += 1;
        for element in failed {
            ctx.handle(PageEvent::ImageError(element), &mut page, t0);
        }
    }

    let avatar = ElementId::new("avatar");
    assert_eq!(rounds, 2);
    assert_eq!(page.image_source(&avatar).as_deref(), Some("img/pageload-spinner.gif"));
    assert_eq!(page.attribute(&avatar, "alt"), Some("Image not available"));
}

#[test]
fn reveal_via_observer_and_polling_agree() {
    let mut page = SimulatedPage::from_layout(&landing_page());
    let mut ctx = native_context(&page);
    let t0 = Instant::now();
    ctx.handle(PageEvent::DomReady, &mut page, t0);
    ctx.handle(PageEvent::Load, &mut page, t0 + ms(100));
    assert_eq!(ctx.reveal().prepared().len(), 3);
    assert_eq!(page.style(&ElementId::new("g2"), "transition-delay"), Some("0.1s"));

    // Observer path
    page.set_scroll_y(600.0);
    pump_intersections(&mut ctx, &mut page, t0 + ms(200));
    assert!(page.has_marker(&ElementId::new("g1"), Marker::RevealActive));

    // Polling path picks up g2 on the next fast tick, before any entry is delivered
    page.set_scroll_y(900.0);
    ctx.handle(PageEvent::Scroll, &mut page, t0 + ms(300));
    assert!(page.has_marker(&ElementId::new("g2"), Marker::RevealActive));

    let activations = page
        .mutations()
        .iter()
        .filter(|m| matches!(m, Mutation::AddMarker { marker: Marker::RevealActive, .. }))
        .count();
    pump_intersections(&mut ctx, &mut page, t0 + ms(300));
    let after = page
        .mutations()
        .iter()
        .filter(|m| matches!(m, Mutation::AddMarker { marker: Marker::RevealActive, .. }))
        .count();
    assert_eq!(activations, after);
}
