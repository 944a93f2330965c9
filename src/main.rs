//! Arcade Duel - demo driver
//!
//! Connects a control bridge to either the in-process simulation or a
//! remote renderer and plays a few episodes with a seeded random policy.

use std::sync::Arc;
use std::thread;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arcade_duel::bridge::{
    BridgeError, ControlBridge, LocalTransport, PeerTransport, WsTransport,
};
use arcade_duel::config::{BridgeMode, Config};
use arcade_duel::game::{Action, MatchConfig};

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);

    info!("Starting Arcade Duel");
    info!(
        mode = ?config.bridge_mode,
        episodes = config.episodes,
        seed = config.seed,
        "Configuration loaded"
    );

    let transport: Box<dyn PeerTransport> = match config.bridge_mode {
        BridgeMode::Local => {
            Box::new(LocalTransport::new(MatchConfig::default()).with_realtime(config.realtime))
        }
        BridgeMode::Ws => Box::new(WsTransport::new(config.peer_addr, config.peer_id.clone())),
    };

    let bridge = Arc::new(ControlBridge::connect_boxed(
        transport,
        config.bridge_config(),
    )?);
    info!(session = %bridge.session_id(), "Bridge connected");

    // Signals close the bridge, which releases any step in flight
    let signal_bridge = Arc::clone(&bridge);
    thread::Builder::new()
        .name("shutdown-signal".to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => {
                    runtime.block_on(shutdown_signal());
                    signal_bridge.close();
                }
                Err(e) => error!(error = %e, "Failed to start signal listener"),
            }
        })?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    for episode in 1..=config.episodes {
        if !run_episode(&bridge, &mut rng, episode)? {
            break;
        }
    }

    bridge.close();
    info!("Shutdown complete");
    Ok(())
}

/// Play one episode. Returns `false` once the bridge can no longer continue.
fn run_episode(
    bridge: &ControlBridge,
    rng: &mut ChaCha8Rng,
    episode: u32,
) -> anyhow::Result<bool> {
    let reset = match bridge.reset() {
        Ok(outcome) => outcome,
        Err(BridgeError::Closed) => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if reset.info.closed {
        return Ok(false);
    }
    if reset.info.timeout {
        warn!(episode, connection_lost = reset.info.connection_lost, "Reset timed out");
        return Ok(!reset.info.connection_lost);
    }

    let mut steps = 0u64;
    let last = loop {
        let p1 = random_action(rng);
        let p2 = random_action(rng);
        let outcome = match bridge.step(p1, p2) {
            Ok(outcome) => outcome,
            Err(BridgeError::Closed) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        steps += 1;
        if outcome.done {
            break outcome;
        }
    };

    if last.info.closed {
        info!(episode, steps, "Episode interrupted by shutdown");
        return Ok(false);
    }
    if last.info.timeout {
        warn!(
            episode,
            steps,
            connection_lost = last.info.connection_lost,
            "Episode ended without an answer from the peer"
        );
        return Ok(!last.info.connection_lost);
    }

    info!(
        episode,
        steps,
        frame = last.info.frame,
        winner = ?last.info.winner,
        p1_health = last.observation.p1_health,
        p2_health = last.observation.p2_health,
        latency_us = last.info.latency.as_micros() as u64,
        "Episode finished"
    );
    Ok(true)
}

fn random_action(rng: &mut ChaCha8Rng) -> Action {
    Action::ALL[rng.gen_range(0..Action::ALL.len())]
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, closing bridge");
        }
        _ = terminate => {
            info!("Received terminate signal, closing bridge");
        }
    }
}
