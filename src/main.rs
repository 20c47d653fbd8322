//! Aura Sentinel - Personal Safety Companion
//!
//! Headless safety runtime: geofence monitoring, duty-cycled audio risk
//! detection, and escalating alert workflows.
//!
//! # Usage
//!
//! ```bash
//! # Run with the durable local store
//! cargo run --release
//!
//! # Run without touching disk
//! cargo run --release -- --memory
//!
//! # Replay the built-in demo walk (leaves home, returns)
//! cargo run --release -- --demo
//! ```
//!
//! # Environment Variables
//!
//! - `AURA_CONFIG`: Path to the runtime config TOML (default: `aura_sentinel.toml`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use aura_sentinel::audio::{PassiveClassifier, SimulatedDevice};
use aura_sentinel::config;
use aura_sentinel::location::ScriptedSource;
use aura_sentinel::notify::LogDispatcher;
use aura_sentinel::storage::{KeyValueStore, MemoryStore, SledStore};
use aura_sentinel::types::Coordinate;
use aura_sentinel::{RuntimeConfig, SafetyPipeline, ZoneDraft};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aura-sentinel")]
#[command(about = "Aura Sentinel Personal Safety Companion")]
#[command(version)]
struct CliArgs {
    /// Directory for the durable local store
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Use an in-memory store instead of the durable one
    #[arg(long)]
    memory: bool,

    /// Replay the built-in demo walk through a safety zone
    #[arg(long)]
    demo: bool,
}

// ============================================================================
// Demo seed data
// ============================================================================

const HOME: Coordinate = Coordinate::new(40.7128, -74.0060);
// ~550 m north of HOME, outside a 200 m zone.
const AWAY: Coordinate = Coordinate::new(40.7178, -74.0060);

/// Seed a contact and a home zone so the demo has someone to notify.
async fn seed_demo_data(pipeline: &SafetyPipeline) -> Result<()> {
    let contact_id = {
        let mut dir = pipeline
            .directory()
            .write()
            .map_err(|e| anyhow::anyhow!("directory lock poisoned: {e}"))?;
        if dir.has_contacts() {
            dir.contacts()[0].id
        } else {
            dir.add_contact("Jamie", "(555) 010-2000")
                .context("failed to seed demo contact")?
        }
    };

    let mut geofence = pipeline.geofence().lock().await;
    if geofence.engine().zones().is_empty() {
        geofence.engine_mut().add_zone(ZoneDraft {
            name: "Home".to_string(),
            latitude: HOME.latitude,
            longitude: HOME.longitude,
            radius: 200.0,
            notify_on_enter: true,
            notify_on_leave: true,
            notification_contact_ids: BTreeSet::from([contact_id]),
            notification_group_ids: BTreeSet::new(),
        });
        info!("Seeded demo zone 'Home' with one recipient");
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    config::init(RuntimeConfig::load());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Aura Sentinel - Personal Safety Companion");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store: Arc<dyn KeyValueStore> = if args.memory {
        info!("Store: in-memory (nothing persisted)");
        Arc::new(MemoryStore::new())
    } else {
        info!(path = %args.data_dir, "Store: sled");
        Arc::new(SledStore::open(&args.data_dir).context("failed to open local store")?)
    };

    let pipeline = SafetyPipeline::new(
        store,
        Arc::new(LogDispatcher),
        // No platform capture hardware in the headless build; the audio
        // pipeline runs against the simulated device.
        Arc::new(SimulatedDevice::with_chunks(Vec::new())),
        Arc::new(PassiveClassifier),
    );

    if args.demo {
        seed_demo_data(&pipeline).await?;
        // Baseline at home, walk out, come back.
        pipeline.start_location_watch(ScriptedSource::from_coordinates(vec![
            HOME, HOME, AWAY, AWAY, HOME,
        ]));
    } else {
        pipeline.start_location_watch(ScriptedSource::from_coordinates(vec![HOME]));
    }

    pipeline.start_ai_monitoring().await;
    info!("Pipeline running — Ctrl+C to stop");

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    cancel_token.cancelled().await;
    pipeline.shutdown().await;

    info!("Aura Sentinel shutdown complete");
    Ok(())
}
