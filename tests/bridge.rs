//! Control bridge behavior against scripted and in-process peers

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use arcade_duel::bridge::{
    BridgeConfig, BridgeError, ConnectionState, ControlBridge, LocalTransport, PeerTransport,
    TransportError,
};
use arcade_duel::game::{Action, MatchConfig, RoundOutcome};
use arcade_duel::ws::protocol::{BridgeMsg, GameState, PeerMsg};
use async_trait::async_trait;

/// How the scripted peer answers one outbound frame
enum Reply {
    Answer,
    /// Answer, but only after the given delay
    Late(Duration),
    Silence,
    Disconnect,
    Garbage,
}

/// Peer that answers each frame according to a fixed script
struct ScriptedPeer {
    ready: bool,
    script: VecDeque<Reply>,
    /// Inbound frames in send order, each with an optional delivery time
    inbound: VecDeque<(Option<tokio::time::Instant>, Result<Option<PeerMsg>, TransportError>)>,
    frame: u64,
}

impl ScriptedPeer {
    fn new(script: Vec<Reply>) -> Self {
        Self {
            ready: true,
            script: script.into(),
            inbound: VecDeque::new(),
            frame: 0,
        }
    }

    fn never_ready() -> Self {
        Self {
            ready: false,
            ..Self::new(Vec::new())
        }
    }

    fn push(&mut self, frame: Result<Option<PeerMsg>, TransportError>) {
        self.inbound.push_back((None, frame));
    }

    fn answer(&mut self, msg: &BridgeMsg) -> PeerMsg {
        self.frame += 1;
        let state = GameState {
            frame: self.frame,
            p1_health: 1.0,
            p2_health: 1.0,
            ..GameState::zeroed()
        };
        match msg {
            BridgeMsg::Reset => PeerMsg::ResetResult { state },
            _ => PeerMsg::ActionResult { state },
        }
    }
}

#[async_trait]
impl PeerTransport for ScriptedPeer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ready {
            self.push(Ok(Some(PeerMsg::ConnectionReady)));
        }
        Ok(())
    }

    async fn send(&mut self, msg: BridgeMsg) -> Result<(), TransportError> {
        if matches!(msg, BridgeMsg::Close) {
            return Ok(());
        }
        match self.script.pop_front().unwrap_or(Reply::Answer) {
            Reply::Answer => {
                let reply = self.answer(&msg);
                self.push(Ok(Some(reply)));
            }
            Reply::Late(delay) => {
                let reply = self.answer(&msg);
                let due = tokio::time::Instant::now() + delay;
                self.inbound.push_back((Some(due), Ok(Some(reply))));
            }
            Reply::Silence => {}
            Reply::Disconnect => self.push(Ok(None)),
            Reply::Garbage => self.push(Err(TransportError::Protocol(
                "unknown frame type".to_string(),
            ))),
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<PeerMsg>, TransportError> {
        // Frames leave in order; a delayed frame holds back the ones behind it
        let due = match self.inbound.front() {
            Some((due, _)) => *due,
            None => return std::future::pending().await,
        };
        if let Some(due) = due {
            tokio::time::sleep_until(due).await;
        }
        match self.inbound.pop_front() {
            Some((_, next)) => next,
            None => std::future::pending().await,
        }
    }
}

fn quick_config() -> BridgeConfig {
    BridgeConfig {
        step_timeout: Duration::from_millis(150),
        reset_timeout: Duration::from_millis(150),
        connect_timeout: Duration::from_secs(2),
        close_timeout: Duration::from_secs(2),
        queue_capacity: 4,
    }
}

#[test]
fn local_peer_plays_a_full_round() {
    let transport = LocalTransport::new(MatchConfig {
        round_seconds: 1,
        ..MatchConfig::default()
    });
    let bridge = ControlBridge::connect(transport, BridgeConfig::default()).unwrap();
    assert_eq!(bridge.connection_state(), ConnectionState::Ready);

    let reset = bridge.reset().unwrap();
    assert!(!reset.done);
    assert_eq!(reset.observation.observation.len(), 8);
    assert_eq!(reset.observation.p1_health, 1.0);
    assert_eq!(reset.info.frame, 0);

    let mut last = None;
    for _ in 0..60 {
        let outcome = bridge.step(Action::Idle, Action::Idle).unwrap();
        assert!(!outcome.info.timeout);
        last = Some(outcome);
    }
    let last = last.unwrap();
    assert!(last.done);
    assert!(last.info.round_over);
    assert_eq!(last.info.frame, 60);
    assert_eq!(last.info.winner, Some(RoundOutcome::Draw));

    // A new round starts cleanly after the old one ended
    let reset = bridge.reset().unwrap();
    assert!(!reset.done);
    assert_eq!(reset.info.frame, 0);

    bridge.close();
    assert_eq!(bridge.connection_state(), ConnectionState::Closed);
}

#[test]
fn silent_peer_step_times_out() {
    let peer = ScriptedPeer::new(vec![Reply::Answer, Reply::Silence]);
    let bridge = ControlBridge::connect(peer, quick_config()).unwrap();

    assert!(!bridge.reset().unwrap().info.timeout);

    let started = Instant::now();
    let outcome = bridge.step(Action::MoveForward, Action::Idle).unwrap();
    assert!(outcome.done);
    assert!(outcome.info.timeout);
    assert!(!outcome.info.connection_lost);
    assert!(!outcome.info.closed);
    assert_eq!(outcome.observation, GameState::zeroed());
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(bridge.connection_state(), ConnectionState::Ready);
}

#[test]
fn silent_peer_reset_times_out_with_zeroed_observation() {
    let peer = ScriptedPeer::new(vec![Reply::Silence]);
    let bridge = ControlBridge::connect(peer, quick_config()).unwrap();

    let started = Instant::now();
    let outcome = bridge.reset().unwrap();
    assert!(outcome.done);
    assert!(outcome.info.timeout);
    assert!(!outcome.info.connection_lost);
    assert_eq!(outcome.observation, GameState::zeroed());
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn late_answer_is_not_handed_to_the_next_step() {
    let config = BridgeConfig {
        step_timeout: Duration::from_millis(400),
        ..quick_config()
    };
    // Frames: reset = 1, late step = 2, then 3 and 4
    let peer = ScriptedPeer::new(vec![
        Reply::Answer,
        Reply::Late(Duration::from_millis(600)),
        Reply::Answer,
        Reply::Answer,
    ]);
    let bridge = ControlBridge::connect(peer, config).unwrap();
    assert_eq!(bridge.reset().unwrap().info.frame, 1);

    let first = bridge.step(Action::Idle, Action::Idle).unwrap();
    assert!(first.info.timeout);

    let second = bridge.step(Action::Idle, Action::Idle).unwrap();
    assert!(!second.info.timeout);
    assert_eq!(second.info.frame, 3);

    let third = bridge.step(Action::Idle, Action::Idle).unwrap();
    assert_eq!(third.info.frame, 4);
}

#[test]
fn disconnect_is_reported_as_lost_connection() {
    let peer = ScriptedPeer::new(vec![Reply::Answer, Reply::Disconnect]);
    let bridge = ControlBridge::connect(peer, quick_config()).unwrap();
    bridge.reset().unwrap();

    let outcome = bridge.step(Action::Idle, Action::Idle).unwrap();
    assert!(outcome.done);
    assert!(outcome.info.timeout);
    assert!(outcome.info.connection_lost);
    assert_eq!(bridge.connection_state(), ConnectionState::Closed);

    // Later calls keep reporting the lost connection without waiting
    let started = Instant::now();
    let outcome = bridge.step(Action::Idle, Action::Idle).unwrap();
    assert!(outcome.info.connection_lost);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[test]
fn protocol_error_closes_the_bridge() {
    let peer = ScriptedPeer::new(vec![Reply::Garbage]);
    let bridge = ControlBridge::connect(peer, quick_config()).unwrap();

    assert!(matches!(bridge.reset(), Err(BridgeError::Protocol(_))));
    assert_eq!(bridge.connection_state(), ConnectionState::Closed);
    assert!(matches!(
        bridge.step(Action::Idle, Action::Idle),
        Err(BridgeError::Closed)
    ));
}

#[test]
fn peer_that_never_becomes_ready_fails_construction() {
    let config = BridgeConfig {
        connect_timeout: Duration::from_millis(100),
        ..quick_config()
    };
    let result = ControlBridge::connect(ScriptedPeer::never_ready(), config);
    assert!(matches!(result, Err(BridgeError::ConnectTimeout(_))));
}

#[test]
fn close_releases_a_parked_step() {
    let config = BridgeConfig {
        step_timeout: Duration::from_secs(30),
        ..quick_config()
    };
    let peer = ScriptedPeer::new(vec![Reply::Answer, Reply::Silence]);
    let bridge = Arc::new(ControlBridge::connect(peer, config).unwrap());
    bridge.reset().unwrap();

    let closer = Arc::clone(&bridge);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        closer.close();
    });

    let started = Instant::now();
    let outcome = bridge.step(Action::Idle, Action::Idle).unwrap();
    assert!(outcome.done);
    assert!(outcome.info.closed);
    assert!(!outcome.info.timeout);
    assert_eq!(outcome.observation, GameState::zeroed());
    assert!(started.elapsed() < Duration::from_secs(5));

    handle.join().unwrap();
    assert_eq!(bridge.connection_state(), ConnectionState::Closed);

    // Idempotent, and later calls are refused
    bridge.close();
    assert!(matches!(
        bridge.step(Action::Idle, Action::Idle),
        Err(BridgeError::Closed)
    ));
}

#[test]
fn concurrent_step_is_rejected() {
    let config = BridgeConfig {
        step_timeout: Duration::from_millis(500),
        ..quick_config()
    };
    let peer = ScriptedPeer::new(vec![Reply::Answer, Reply::Silence]);
    let bridge = Arc::new(ControlBridge::connect(peer, config).unwrap());
    bridge.reset().unwrap();

    let parked = Arc::clone(&bridge);
    let handle = thread::spawn(move || parked.step(Action::Idle, Action::Idle));

    thread::sleep(Duration::from_millis(100));
    assert!(matches!(
        bridge.step(Action::Jump, Action::Jump),
        Err(BridgeError::Reentrant)
    ));

    let first = handle.join().unwrap().unwrap();
    assert!(first.info.timeout);
}
