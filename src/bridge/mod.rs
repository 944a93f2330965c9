//! Control bridge: a blocking reset/step API over an asynchronous peer connection
//!
//! The caller's thread only touches two bounded queues. A single worker
//! thread owns the peer transport and runs a cooperative event loop that
//! moves frames between the queues and the peer.

pub mod error;
pub mod transport;
mod worker;
pub mod ws_transport;

pub use error::{BridgeError, TransportError};
pub use transport::{LocalTransport, PeerTransport};
pub use ws_transport::WsTransport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::{Action, RoundOutcome};
use crate::util::time::Timer;
use crate::ws::protocol::{BridgeMsg, GameState};

use self::worker::{Command, WorkerEvent};

/// Observation handed back to the caller
pub type Observation = GameState;

/// Bridge timeouts and queue sizing
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub step_timeout: Duration,
    pub reset_timeout: Duration,
    /// How long construction waits for `connection_ready`
    pub connect_timeout: Duration,
    /// Bounded wait when joining the worker on close
    pub close_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(2),
            queue_capacity: 16,
        }
    }
}

/// Connection state as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Closed,
}

/// Side channel describing how a step ended
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    /// The peer reported the round as finished
    pub round_over: bool,
    pub winner: Option<RoundOutcome>,
    /// No answer within the deadline; the observation is zeroed
    pub timeout: bool,
    /// The peer went away; always reported together with `timeout`
    pub connection_lost: bool,
    /// `close()` released this call before an answer arrived
    pub closed: bool,
    pub frame: u64,
    /// Time from enqueueing the request to receiving its answer
    pub latency: Duration,
}

/// Result of `reset()` or `step()`
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    /// Episode is over: round end, timeout or close
    pub done: bool,
    pub info: StepInfo,
}

impl StepOutcome {
    fn from_state(state: GameState, latency: Duration) -> Self {
        let info = StepInfo {
            round_over: state.round_over,
            winner: state.winner,
            timeout: false,
            connection_lost: false,
            closed: false,
            frame: state.frame,
            latency,
        };
        Self {
            done: state.round_over,
            observation: state,
            info,
        }
    }

    /// Terminal outcome synthesized when no answer arrives
    fn timed_out(connection_lost: bool, latency: Duration) -> Self {
        Self {
            observation: GameState::zeroed(),
            done: true,
            info: StepInfo {
                timeout: true,
                connection_lost,
                latency,
                ..Default::default()
            },
        }
    }

    /// Terminal outcome for a call released by `close()`
    fn cancelled(latency: Duration) -> Self {
        Self {
            observation: GameState::zeroed(),
            done: true,
            info: StepInfo {
                closed: true,
                latency,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Reset,
    Action,
}

/// Caller-side end of the result queue
struct Inbox {
    events: mpsc::Receiver<WorkerEvent>,
    state: ConnectionState,
    /// Answers still owed for requests that timed out after being sent.
    /// The peer answers in send order, so these arrive before any newer one.
    owed: usize,
}

impl Inbox {
    /// Consume one owed answer. Returns `true` if the result was late.
    fn settle_late(&mut self) -> bool {
        if self.owed > 0 {
            self.owed -= 1;
            true
        } else {
            false
        }
    }
}

/// Synchronous reset/step facade over a peer transport.
///
/// Construction blocks until the peer is ready. Calls are not reentrant:
/// a second `step()`/`reset()` while one is in flight fails with
/// `BridgeError::Reentrant`. Must not be used from inside an async runtime.
pub struct ControlBridge {
    session: Uuid,
    config: BridgeConfig,
    commands: mpsc::Sender<Command>,
    /// Clone of the result queue's sender, used only for the close sentinel
    sentinel: mpsc::Sender<WorkerEvent>,
    inbox: Mutex<Inbox>,
    /// Drives queue timeouts on the caller's thread
    runtime: Runtime,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ControlBridge {
    /// Start the worker on `transport` and wait for the peer to become ready
    pub fn connect<T: PeerTransport>(
        transport: T,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        Self::connect_boxed(Box::new(transport), config)
    }

    pub fn connect_boxed(
        transport: Box<dyn PeerTransport>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let session = Uuid::new_v4();
        let capacity = config.queue_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let handle = worker::spawn(session, transport, command_rx, event_tx.clone())?;

        let bridge = Self {
            session,
            config,
            commands: command_tx,
            sentinel: event_tx,
            inbox: Mutex::new(Inbox {
                events: event_rx,
                state: ConnectionState::Connecting,
                owed: 0,
            }),
            runtime,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        };

        info!(session = %session, "Waiting for peer connection");
        bridge.await_ready()?;
        info!(session = %session, "Peer connection ready");
        Ok(bridge)
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            return ConnectionState::Closed;
        }
        match self.inbox.try_lock() {
            Some(inbox) => inbox.state,
            // A call is in flight, which only happens once ready
            None => ConnectionState::Ready,
        }
    }

    /// Start a new round. On timeout the observation is zeroed and
    /// `info.timeout` is set instead of returning an error.
    pub fn reset(&self) -> Result<StepOutcome, BridgeError> {
        self.request(BridgeMsg::Reset, Expect::Reset, self.config.reset_timeout)
    }

    /// Advance one frame. On timeout the episode is reported as done with
    /// `info.timeout` set.
    pub fn step(&self, p1: Action, p2: Action) -> Result<StepOutcome, BridgeError> {
        self.request(
            BridgeMsg::action(p1, p2),
            Expect::Action,
            self.config.step_timeout,
        )
    }

    /// Stop the worker and release any caller parked in `step()`/`reset()`.
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(session = %self.session, "Closing bridge");

        let _ = self.sentinel.try_send(WorkerEvent::Closed);
        if self.commands.try_send(Command::Shutdown).is_err() {
            debug!(session = %self.session, "Worker already gone or queue full on close");
        }

        if let Some(handle) = self.worker.lock().take() {
            let timer = Timer::new();
            while !handle.is_finished() && timer.elapsed() < self.config.close_timeout {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!(session = %self.session, "Bridge worker panicked");
                }
            } else {
                warn!(
                    session = %self.session,
                    timeout_ms = self.config.close_timeout.as_millis() as u64,
                    "Bridge worker did not stop in time, detaching"
                );
            }
        }
    }

    fn await_ready(&self) -> Result<(), BridgeError> {
        // Timers in `timeout` need the caller runtime's context
        let _rt = self.runtime.enter();
        let mut inbox = self.inbox.lock();
        let received = self
            .runtime
            .block_on(timeout(self.config.connect_timeout, inbox.events.recv()));

        let err = match received {
            Err(_) => {
                warn!(session = %self.session, "Peer not ready before deadline");
                BridgeError::ConnectTimeout(self.config.connect_timeout)
            }
            Ok(Some(WorkerEvent::Ready)) => {
                inbox.state = ConnectionState::Ready;
                return Ok(());
            }
            Ok(Some(WorkerEvent::ConnectionLost(msg))) => BridgeError::ConnectionLost(msg),
            Ok(Some(WorkerEvent::ProtocolError(msg))) => BridgeError::Protocol(msg),
            Ok(Some(WorkerEvent::ResetResult(_))) | Ok(Some(WorkerEvent::ActionResult(_))) => {
                BridgeError::Protocol("result before connection_ready".to_string())
            }
            Ok(Some(WorkerEvent::Closed)) | Ok(None) => BridgeError::Closed,
        };

        inbox.state = ConnectionState::Closed;
        drop(inbox);
        self.close();
        Err(err)
    }

    fn request(
        &self,
        msg: BridgeMsg,
        expect: Expect,
        deadline: Duration,
    ) -> Result<StepOutcome, BridgeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        let mut inbox = self.inbox.try_lock().ok_or(BridgeError::Reentrant)?;
        let _rt = self.runtime.enter();

        match inbox.state {
            ConnectionState::Ready => {}
            ConnectionState::Closed => {
                return Ok(StepOutcome::timed_out(true, Duration::ZERO));
            }
            ConnectionState::Connecting => return Err(BridgeError::Closed),
        }

        // Answers that missed an earlier deadline must not answer this request
        loop {
            let Ok(event) = inbox.events.try_recv() else {
                break;
            };
            match event {
                WorkerEvent::ResetResult(_) | WorkerEvent::ActionResult(_) => {
                    if inbox.settle_late() {
                        debug!(session = %self.session, owed = inbox.owed, "Discarding late result");
                    } else {
                        warn!(session = %self.session, "Discarding unrequested result");
                    }
                }
                WorkerEvent::Ready => {}
                terminal => {
                    return self.finish_terminal(inbox, terminal, Duration::ZERO);
                }
            }
        }

        let timer = Timer::new();
        let queued = self
            .runtime
            .block_on(timeout(deadline, self.commands.send(Command::Send(msg))));
        match queued {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                warn!(session = %self.session, "Worker gone, treating as lost connection");
                inbox.state = ConnectionState::Closed;
                return Ok(StepOutcome::timed_out(true, timer.elapsed()));
            }
            Err(_) => {
                warn!(session = %self.session, ?expect, "Action queue full past deadline");
                return Ok(StepOutcome::timed_out(false, timer.elapsed()));
            }
        }

        loop {
            let remaining = timer.remaining(deadline);
            let received = self.runtime.block_on(timeout(remaining, inbox.events.recv()));
            let event = match received {
                Err(_) => {
                    warn!(
                        session = %self.session,
                        ?expect,
                        timeout_ms = deadline.as_millis() as u64,
                        "No result from peer before deadline"
                    );
                    inbox.owed += 1;
                    return Ok(StepOutcome::timed_out(false, timer.elapsed()));
                }
                Ok(None) => {
                    inbox.state = ConnectionState::Closed;
                    return Ok(StepOutcome::timed_out(true, timer.elapsed()));
                }
                Ok(Some(event)) => event,
            };

            let is_result = matches!(
                event,
                WorkerEvent::ResetResult(_) | WorkerEvent::ActionResult(_)
            );
            if is_result && inbox.settle_late() {
                debug!(session = %self.session, owed = inbox.owed, "Discarding late result");
                continue;
            }

            match (event, expect) {
                (WorkerEvent::ResetResult(state), Expect::Reset)
                | (WorkerEvent::ActionResult(state), Expect::Action) => {
                    return Ok(StepOutcome::from_state(state, timer.elapsed()));
                }
                (WorkerEvent::ResetResult(_), _) | (WorkerEvent::ActionResult(_), _) => {
                    debug!(session = %self.session, ?expect, "Discarding result of the other kind");
                }
                (WorkerEvent::Ready, _) => {
                    warn!(session = %self.session, "Unexpected ready event");
                }
                (terminal, _) => {
                    return self.finish_terminal(inbox, terminal, timer.elapsed());
                }
            }
        }
    }

    /// Map a lost connection, protocol failure or close sentinel to the caller-visible result.
    /// A caller released by `close()` sees a graceful terminal step, not an error.
    fn finish_terminal(
        &self,
        mut inbox: parking_lot::MutexGuard<'_, Inbox>,
        event: WorkerEvent,
        latency: Duration,
    ) -> Result<StepOutcome, BridgeError> {
        inbox.state = ConnectionState::Closed;
        match event {
            WorkerEvent::ConnectionLost(msg) => {
                warn!(session = %self.session, reason = %msg, "Peer connection lost");
                Ok(StepOutcome::timed_out(true, latency))
            }
            WorkerEvent::ProtocolError(msg) => {
                error!(session = %self.session, error = %msg, "Protocol error, closing bridge");
                drop(inbox);
                self.close();
                Err(BridgeError::Protocol(msg))
            }
            _ => {
                debug!(session = %self.session, "Call released by close");
                Ok(StepOutcome::cancelled(latency))
            }
        }
    }
}

impl Drop for ControlBridge {
    fn drop(&mut self) {
        self.close();
    }
}
