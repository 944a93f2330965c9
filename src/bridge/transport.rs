//! Peer transport seam and the in-process simulation peer

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::game::snapshot::SnapshotBuilder;
use crate::game::{Action, MatchConfig, MatchSimulation};
use crate::util::time::tick_duration;
use crate::ws::protocol::{BridgeMsg, PeerMsg};

use super::error::TransportError;

/// A bidirectional frame channel to the peer that runs the match.
///
/// All methods are called from the bridge worker only. `recv` is raced
/// against the outbound action queue, so it must be cancel-safe: dropping
/// its future must not lose a frame.
#[async_trait]
pub trait PeerTransport: Send + 'static {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Establish the connection. The peer announces readiness afterwards
    /// with a `connection_ready` frame.
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn send(&mut self, msg: BridgeMsg) -> Result<(), TransportError>;

    /// Next inbound frame, or `None` once the peer has gone away
    async fn recv(&mut self) -> Result<Option<PeerMsg>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Self-contained peer: the worker drives a local `MatchSimulation`
pub struct LocalTransport {
    sim: MatchSimulation,
    snapshots: SnapshotBuilder,
    pending: VecDeque<PeerMsg>,
    realtime: bool,
    pacing: Option<Interval>,
    closed: bool,
}

impl LocalTransport {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            sim: MatchSimulation::new(config),
            snapshots: SnapshotBuilder::new(),
            pending: VecDeque::new(),
            realtime: false,
            pacing: None,
            closed: false,
        }
    }

    /// Pace action frames at the simulation tick rate on the wall clock
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn simulation(&self) -> &MatchSimulation {
        &self.sim
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

#[async_trait]
impl PeerTransport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.realtime {
            let mut ticker = interval(tick_duration());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            self.pacing = Some(ticker);
        }
        self.closed = false;
        self.pending.push_back(PeerMsg::ConnectionReady);
        Ok(())
    }

    async fn send(&mut self, msg: BridgeMsg) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        match msg {
            BridgeMsg::Reset => {
                self.sim.reset();
                let state = self.snapshots.build(&self.sim);
                self.pending.push_back(PeerMsg::ResetResult { state });
            }
            BridgeMsg::Action {
                p1_action,
                p2_action,
            } => {
                if let Some(ticker) = self.pacing.as_mut() {
                    ticker.tick().await;
                }
                let (Some(p1), Some(p2)) =
                    (Action::from_code(p1_action), Action::from_code(p2_action))
                else {
                    warn!(p1_action, p2_action, "Unknown action code");
                    return Err(TransportError::Protocol(format!(
                        "unknown action code in ({p1_action}, {p2_action})"
                    )));
                };
                self.sim.step(p1, p2);
                let state = self.snapshots.build(&self.sim);
                self.pending.push_back(PeerMsg::ActionResult { state });
            }
            BridgeMsg::Close => {
                debug!("Local peer received close");
                self.closed = true;
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<PeerMsg>, TransportError> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(Some(msg));
        }
        if self.closed {
            return Ok(None);
        }
        // Nothing until the next outbound frame
        std::future::pending().await
    }
}
