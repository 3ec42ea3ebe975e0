use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use pagectl_core::sim::{Scenario, SimulatedPage};
use pagectl_core::{Capability, PageConfig, PageContext, PageDriver, ViewportTracker};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    pub degraded: bool,
    pub json: bool,
}

pub async fn run(path: &Path, config: PageConfig, options: ReplayOptions) -> Result<()> {
    let scenario = Scenario::load(path)
        .with_context(|| format!("Failed to load scenario {}", path.display()))?;

    // Timers and sleeps complete as soon as the runtime is idle
    tokio::time::pause();

    let page = SimulatedPage::with_navigation(&scenario.layout, &config.navigation);
    let capability = if options.degraded {
        Capability::Degraded
    } else {
        Capability::native(page.observer_backend())
    };
    let context = PageContext::new(config, capability);
    let driver = PageDriver::new(context, page);

    info!(
        scenario = scenario.name.as_deref().unwrap_or("unnamed"),
        events = scenario.events.len(),
        duration_ms = scenario.duration_ms(),
        degraded = options.degraded,
        "Replaying scenario"
    );

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            let _ = shutdown_tx.send(true);
        }
    });

    let feeder = async move {
        let start = tokio::time::Instant::now();
        for timed in scenario.events {
            tokio::time::sleep_until(start + Duration::from_millis(timed.at_ms)).await;
            if input_tx.send(timed.event).is_err() {
                break;
            }
        }
    };

    let (driver, ()) = tokio::join!(driver.run(input_rx, shutdown_rx), feeder);
    let (context, page) = driver.into_parts();

    for mutation in page.mutations() {
        if options.json {
            println!("{}", mutation.to_json_line()?);
        } else {
            println!("{mutation}");
        }
    }

    if !options.json {
        let state = context.scroll_state();
        println!();
        println!("Mutations: {}", page.mutations().len());
        println!("Scroll position: {}", page.scroll_y());
        println!(
            "Active section: {}",
            state.active_section_id.as_deref().unwrap_or("(none)")
        );
        println!("Menu: {:?}", context.menu_state());
    }

    Ok(())
}
