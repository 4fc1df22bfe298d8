//! Desktop simulator for the baro-link telemetry delivery path.
//!
//! Runs the real [`TelemetryNode`] against scripted peers: a radio and a
//! broker that drop out on configured cycles, a synthetic barometer, and a
//! host directory standing in for the SD card. Readings that cannot be
//! published land in the backup log under `volume_dir` and can be drained
//! with a `replay` command on the subscribed topic.
//!
//! # Commands
//!
//! | Payload  | Action                                |
//! |----------|---------------------------------------|
//! | `replay` | Republish the backup log, oldest first |
//! | `purge`  | Empty the backup log                  |
//! | `stats`  | Log the delivery counters             |
//!
//! Settings come from the TOML file named by `BARO_LINK_CONFIG`; `RUST_LOG`
//! overrides the level implied by `delivery.verbose`.

mod fs_volume;
mod settings;
mod sim;

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use baro_link_core::link::keep_alive;
use baro_link_core::ports::InboundMessage;
use baro_link_core::{
    DeliveryCoordinator, DeliveryOutcome, Session, SharedSession, TelemetryNode,
};
use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::fs_volume::FsVolume;
use crate::settings::SimulatorConfig;
use crate::sim::{SimBarometer, SimBroker, SimNetwork, StdDelay, World};

type SimNode = TelemetryNode<SimBarometer, FsVolume, StdDelay>;
type SimSession = SharedSession<SimNetwork, SimBroker>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn handle_command(node: &mut SimNode, shared: &SimSession, message: InboundMessage) {
    let payload = String::from_utf8_lossy(&message.payload);
    info!("Command on {}: {}", message.topic, payload);

    match payload.trim() {
        "replay" => {
            let result = block_on(async {
                let mut session = shared.lock().await;
                node.coordinator_mut().replay_backlog(&mut *session).await
            });
            match result {
                Ok(report) => info!(
                    "Replay: {} republished, {} remaining",
                    report.republished, report.remaining
                ),
                Err(e) => error!("Replay failed: {}", e),
            }
        }
        "purge" => match node.coordinator_mut().backup_mut().purge() {
            Ok(()) => info!("Backup log purged"),
            Err(e) => error!("Purge failed: {}", e),
        },
        "stats" => log_stats(node),
        other => warn!("Unknown command {:?}", other),
    }
}

fn log_stats(node: &SimNode) {
    let stats = node.coordinator().stats();
    info!(
        "Delivery: {} published, {} backed up, {} dropped",
        stats.published, stats.backed_up, stats.dropped
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let (config, load_error) = match SimulatorConfig::from_env() {
        Ok(config) => (config, None),
        Err(e) => (SimulatorConfig::default(), Some(e)),
    };

    env_logger::Builder::new()
        .filter_level(config.node.log_level())
        .parse_default_env()
        .init();

    if let Some(e) = load_error {
        warn!("{}, continuing with defaults", e);
    }

    info!("Starting baro-link simulator");
    let SimulatorConfig { node: node_config, simulation } = config;
    info!(
        "{} cycles, broker {}:{}, backup in {}/{}",
        simulation.cycles,
        node_config.broker.host,
        node_config.broker.port,
        simulation.volume_dir,
        node_config.delivery.backup_file
    );

    let world = World::new(&simulation);

    let mut volume = FsVolume::new(&simulation.volume_dir);
    volume.set_present(!simulation.card_absent);

    let coordinator = DeliveryCoordinator::new(
        node_config.clone(),
        volume,
        StdDelay::new(simulation.time_scale),
    );
    let mut node = TelemetryNode::new(SimBarometer::new(Rc::clone(&world)), coordinator);

    let shared = Session::new(
        SimNetwork::new(Rc::clone(&world)),
        SimBroker::new(Rc::clone(&world)),
        &node_config.broker,
    )
    .into_shared();

    let mut pacing = StdDelay::new(simulation.time_scale);
    let interval_secs = node_config.sample_interval_ms / 1000;
    let start_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32;

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    for cycle in 0..simulation.cycles {
        world.advance_to(cycle);
        let timestamp = start_ts.saturating_add(cycle.saturating_mul(interval_secs));

        let outcome = block_on(async {
            let mut session = shared.lock().await;
            node.tick(&mut *session, timestamp).await
        });
        match outcome {
            Some(DeliveryOutcome::Published) => info!("[{:>3}] published", cycle),
            Some(DeliveryOutcome::BackedUp) => warn!("[{:>3}] backed up", cycle),
            Some(DeliveryOutcome::Dropped) => error!("[{:>3}] dropped", cycle),
            None => warn!("[{:>3}] no sample ({:?})", cycle, node.run_state()),
        }

        let mut command = None;
        block_on(keep_alive(&shared, |message| command = Some(message)));
        if let Some(message) = command {
            handle_command(&mut node, &shared, message);
        }

        block_on(pacing.delay_ms(node_config.sample_interval_ms));
    }

    log_stats(&node);
    match node.coordinator_mut().backup_mut().list_pending() {
        Ok(pending) => info!("{} records left in the backup log", pending.len()),
        Err(e) => warn!("Backup log unreadable: {}", e),
    }
    info!("Simulator exiting");
}
