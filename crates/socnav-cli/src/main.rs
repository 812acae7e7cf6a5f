//! `socnav-cli` – social navigation layers demo binary.
//!
//! Wires the whole stack together in one process:
//!
//! 1. Loads `~/.socnav/config.toml` (writing the defaults on first run).
//! 2. Publishes a static source→global transform into a [`TfBuffer`].
//! 3. Runs a simulated perception feed that publishes batches on the
//!    [`FeedBus`] at `feed_hz`; an ingest task installs them in the shared
//!    [`AgentSnapshotStore`].
//! 4. Runs the map-update cycle at `update_hz`, printing the dirty region
//!    reported by the [`SocialLayer`] each cycle.
//! 5. Stops cleanly on Ctrl-C.

mod config;
mod sim;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use socnav_middleware::FeedBus;
use socnav_perception::{AgentSnapshotStore, FrameTransformer, Quaternion, TfBuffer, Transform3D};
use socnav_runtime::{SocialLayer, TelemetryConfig, init_tracing, spawn_ingest};
use socnav_types::{BoundingBox, FeedEvent, ObjectClass, Vec3};

use sim::PeopleSimulator;

const FEED_SOURCE: &str = "socnav-cli::sim";

fn main() {
    let _guard = init_tracing(&TelemetryConfig::from_env("socnav"));

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "  Ctrl-C received – stopping …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process with SIGKILL");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            match config::save(&config::Config::default()) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::defaults_with_env().unwrap_or_else(|e| {
                println!("{}: {}", "Config error".red(), e);
                println!("  Ignoring SOCNAV_* overrides.");
                config::Config::default()
            })
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    info!(?cfg, "configuration");

    let (update_period, feed_period) = match (cfg.update_period(), cfg.feed_period()) {
        (Ok(update), Ok(feed)) => (update, feed),
        (Err(e), _) | (_, Err(e)) => {
            println!("{}: {}", "Config error".red(), e);
            return;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start Tokio runtime".red(), e);
            return;
        }
    };
    runtime.block_on(run(cfg, update_period, feed_period, shutdown));
}

async fn run(
    cfg: config::Config,
    update_period: Duration,
    feed_period: Duration,
    shutdown: Arc<AtomicBool>,
) {
    // ── Frames ────────────────────────────────────────────────────────────
    let tf = TfBuffer::new();
    tf.set_static_transform(
        &cfg.global_frame,
        &cfg.source_frame,
        Transform3D::new(
            Vec3::new(cfg.map_offset_x, cfg.map_offset_y, 0.0),
            Quaternion::from_yaw(cfg.map_yaw_rad),
        ),
    );
    let transformer: Arc<dyn FrameTransformer> = Arc::new(tf);

    // ── Feed → store ──────────────────────────────────────────────────────
    let bus = FeedBus::default();
    let store = Arc::new(AgentSnapshotStore::new());
    let ingest = spawn_ingest(bus.subscribe_source(FEED_SOURCE), Arc::clone(&store));

    let feed = {
        let bus = bus.clone();
        let shutdown = shutdown.clone();
        let period = feed_period;
        let mut simulator = PeopleSimulator::new(
            cfg.simulated_people,
            cfg.source_frame.clone(),
            ObjectClass(cfg.person_class),
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            while !shutdown.load(Ordering::SeqCst) {
                ticker.tick().await;
                simulator.step(period.as_secs_f64());
                let event = FeedEvent::new(FEED_SOURCE, simulator.snapshot(chrono::Utc::now()));
                if let Err(e) = bus.publish(event) {
                    warn!(error = %e, "simulated delivery dropped");
                }
            }
        })
    };

    // ── Map-update cycle ──────────────────────────────────────────────────
    let layer_config = cfg.layer_config();
    let mut layer =
        SocialLayer::new("social_layer", Arc::clone(&store), transformer, &layer_config);
    let mut ticker = tokio::time::interval(update_period);
    println!();
    while !shutdown.load(Ordering::SeqCst) {
        ticker.tick().await;
        let mut bounds = BoundingBox::empty();
        layer.update_bounds(&cfg.global_frame, &mut bounds);
        print_cycle(&layer, &bounds);
    }

    // ── Teardown ──────────────────────────────────────────────────────────
    if let Err(e) = feed.await {
        warn!(error = %e, "feed task ended abnormally");
    }
    drop(bus);
    match ingest.await {
        Ok(delivered) => info!(delivered, "ingest finished"),
        Err(e) => warn!(error = %e, "ingest task ended abnormally"),
    }

    let counters = layer.counters();
    println!(
        "  {} {} cycles, {} transform failures.",
        "✓".green().bold(),
        counters.cycles,
        counters.total()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_cycle(layer: &SocialLayer, bounds: &BoundingBox) {
    let people = layer.transformed_agents().len();
    if bounds.is_empty() {
        println!("  {:>3} people  {}", people, "no update".dimmed());
    } else {
        println!(
            "  {:>3} people  dirty [{:>7.2}, {:>7.2}] – [{:>7.2}, {:>7.2}]",
            people, bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
        );
    }
}

fn print_banner() {
    println!();
    println!("  {} {}", "socnav".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Social navigation layers – people feed → costmap dirty region");
    println!();
}
