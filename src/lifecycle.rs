//! Service lifecycle state machine.
//!
//! Owns the one process-wide picture of the service: the state variable, the
//! protocol-engine handle, the deferred-work task's wake sender, and the exit
//! flag, all behind a single mutex. Startup is a bounded-retry protocol whose
//! readiness determination is delegated to the worker task itself; shutdown
//! is best-effort and bounded. Every operation is safe under arbitrary
//! interleaving from independent caller contexts.

use crate::handlers::{favicon_handler, root_handler};
use crate::routes::Handler;
use crate::runtime_config::ServerConfig;
use crate::server::engine::{EngineHandle, ProtocolEngine};
use crate::static_files::StaticVolume;
use crate::worker::{spawn_worker, DeferredJob, ReadySignal, WorkerMessage, WorkerSender};
use http::Method;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const MAX_START_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
// Unchecked doubling would eventually overflow; clamp instead.
const BACKOFF_CAP: Duration = Duration::from_secs(1);
const WORKER_READY_TIMEOUT: Duration = Duration::from_millis(500);
const STOP_POLL_ATTEMPTS: u32 = 50;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle phase of the service. Transitions only ever move
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`, with `Starting`
/// and `Stopping` allowed to regress to `Stopped` on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Outcome of [`ServiceController::wait_until_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timed out before the service became ready")]
    TimedOut,
    #[error("service is stopped or stopping; no startup in flight")]
    InvalidState,
    #[error("lifecycle state is unavailable")]
    OperationFailed,
}

/// Failure of a route registration call.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route operations require a running service")]
    InvalidState,
    #[error("route path must be a non-empty absolute URI")]
    InvalidArgument,
    #[error("lifecycle state is unavailable")]
    OperationFailed,
    /// Engine errors are surfaced verbatim.
    #[error(transparent)]
    Engine(#[from] io::Error),
}

/// Durable lifecycle fields. One atomic unit: never read or written outside
/// the shared mutex.
pub(crate) struct LifecycleState {
    pub(crate) state: ServiceState,
    pub(crate) engine: Option<Arc<dyn EngineHandle>>,
    pub(crate) worker: Option<WorkerSender>,
    pub(crate) worker_exit: bool,
    pub(crate) max_open_sockets: usize,
}

/// State shared between the controller and the worker coroutine.
pub(crate) struct Shared {
    pub(crate) state: Mutex<LifecycleState>,
    pub(crate) ready: ReadySignal,
}

/// The service control surface.
///
/// `start`/`stop` are idempotent fire-and-forget operations; observe their
/// outcome through [`ServiceController::is_running`] and
/// [`ServiceController::wait_until_running`]. All operations degrade to
/// no-ops (or `OperationFailed`) if the lifecycle mutex is poisoned; nothing
/// in this module panics on behalf of a caller.
pub struct ServiceController {
    shared: Arc<Shared>,
    engine: Arc<dyn ProtocolEngine>,
    volume: Option<Arc<StaticVolume>>,
    config: ServerConfig,
}

impl ServiceController {
    pub fn new(engine: Arc<dyn ProtocolEngine>, config: ServerConfig) -> Self {
        let config = config.normalized();
        let volume = config.static_enabled.then(|| {
            Arc::new(StaticVolume::new(
                config.static_dir.clone(),
                config.volume_label.clone(),
            ))
        });
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LifecycleState {
                    state: ServiceState::Stopped,
                    engine: None,
                    worker: None,
                    worker_exit: false,
                    max_open_sockets: 0,
                }),
                ready: ReadySignal::new(),
            }),
            engine,
            volume,
            config,
        }
    }

    /// Start the service.
    ///
    /// Collapses concurrent calls into the first winner and runs up to five
    /// startup attempts with capped exponential backoff. Returns without an
    /// error code by contract; the observable state is `Running` on success
    /// and `Stopped` after exhaustion.
    pub fn start(&self) {
        {
            let Ok(mut st) = self.shared.state.lock() else {
                return;
            };
            if st.state != ServiceState::Stopped {
                return;
            }
            st.state = ServiceState::Starting;
            st.worker_exit = false;
        }

        let mut backoff = INITIAL_BACKOFF;
        for attempt in 1..=MAX_START_ATTEMPTS {
            // Each attempt begins with the readiness bit down; a stale set
            // from a torn-down attempt must not satisfy this attempt's wait.
            self.shared.ready.clear();

            if let Err(err) = self.start_engine() {
                warn!(attempt, error = %err, "engine start failed");
                thread::sleep(backoff);
                backoff = next_backoff(backoff);
                continue;
            }

            if !self.start_worker() {
                // Undo everything this attempt started.
                self.stop_engine();
                thread::sleep(backoff);
                backoff = next_backoff(backoff);
                continue;
            }

            if self.shared.ready.wait(WORKER_READY_TIMEOUT) {
                // The worker's commit already promoted the state to Running.
                info!(attempt, "service started");
                return;
            }

            warn!(attempt, "worker did not commit readiness in time");
            self.abort_attempt();
            thread::sleep(backoff);
            backoff = next_backoff(backoff);
        }

        error!("startup attempts exhausted; service left stopped");
        if let Ok(mut st) = self.shared.state.lock() {
            st.state = ServiceState::Stopped;
        }
        self.shared.ready.clear();
    }

    /// Stop the service. Idempotent; never blocks forever.
    pub fn stop(&self) {
        let worker = {
            let Ok(mut st) = self.shared.state.lock() else {
                return;
            };
            if st.state == ServiceState::Stopped {
                return;
            }
            st.state = ServiceState::Stopping;
            st.worker_exit = true;
            st.worker.clone()
        };
        self.shared.ready.clear();

        if let Some(tx) = worker {
            let _ = tx.send(WorkerMessage::Wake);
        }
        let _ = self.stop_worker();
        self.stop_engine();

        if let Ok(mut st) = self.shared.state.lock() {
            st.state = ServiceState::Stopped;
        }
        // Covers the case where the worker never exited within the timeout.
        self.shared.ready.clear();
        info!("service stopped");
    }

    /// True iff the service is fully running (worker committed readiness).
    pub fn is_running(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|st| st.state == ServiceState::Running)
            .unwrap_or(false)
    }

    /// Block until the service is running, a startup in flight fails, or
    /// `timeout` elapses. A zero timeout degenerates to a poll.
    pub fn wait_until_running(&self, timeout: Duration) -> Result<(), WaitError> {
        {
            let Ok(st) = self.shared.state.lock() else {
                return Err(WaitError::OperationFailed);
            };
            match st.state {
                ServiceState::Running => return Ok(()),
                ServiceState::Stopped | ServiceState::Stopping => {
                    return Err(WaitError::InvalidState)
                }
                ServiceState::Starting => {}
            }
        }
        if self.shared.ready.wait(timeout) {
            Ok(())
        } else {
            Err(WaitError::TimedOut)
        }
    }

    /// Register a route on the running engine.
    pub fn register_uri(
        &self,
        path: &str,
        method: Method,
        handler: Handler,
    ) -> Result<(), RouteError> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(RouteError::InvalidArgument);
        }
        self.register_guarded(path, method, handler, false)
    }

    /// Unregister a previously registered route.
    pub fn unregister_uri(&self, path: &str, method: Method) -> Result<(), RouteError> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(RouteError::InvalidArgument);
        }
        let Ok(st) = self.shared.state.lock() else {
            return Err(RouteError::OperationFailed);
        };
        if st.state != ServiceState::Running {
            return Err(RouteError::InvalidState);
        }
        let Some(engine) = st.engine.as_ref() else {
            return Err(RouteError::InvalidState);
        };
        engine.unregister_route(path, method).map_err(RouteError::Engine)
    }

    /// Hand a job to the deferred-work task so the calling request handler
    /// never blocks the engine. Returns false when the service is not running
    /// or the worker is gone.
    pub fn defer<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = {
            let Ok(st) = self.shared.state.lock() else {
                return false;
            };
            if st.state != ServiceState::Running {
                return false;
            }
            st.worker.clone()
        };
        match sender {
            Some(tx) => tx.send(WorkerMessage::Job(Box::new(job) as DeferredJob)).is_ok(),
            None => false,
        }
    }

    /// Force-close every live client session on the engine. Best effort: an
    /// enumeration error aborts the whole pass.
    pub fn close_all_sessions(&self) {
        let (engine, max_socks) = {
            let Ok(st) = self.shared.state.lock() else {
                return;
            };
            (st.engine.clone(), st.max_open_sockets)
        };
        let Some(engine) = engine else {
            return;
        };
        if max_socks == 0 {
            return;
        }
        let sessions = match engine.open_sessions(max_socks) {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %err, "session enumeration failed");
                return;
            }
        };
        for session in sessions {
            if session >= 0 {
                engine.close_session(session);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Startup/shutdown steps. Each is individually idempotent so a racing
    // stop() can at worst cause a benign double teardown.
    // ---------------------------------------------------------------------

    fn start_engine(&self) -> io::Result<()> {
        {
            let Ok(mut st) = self.shared.state.lock() else {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "lifecycle state unavailable",
                ));
            };
            if st.engine.is_none() {
                let handle = self.engine.start()?;
                st.engine = Some(Arc::from(handle));
                st.max_open_sockets = self.config.max_open_sockets;
            }
        }

        if let Some(volume) = &self.volume {
            // Mount failure is not fatal here; requests fall back to the
            // embedded pages until a later mount attempt succeeds.
            let _ = volume.ensure_mounted();
        }

        if let Err(err) = self.register_builtin_routes() {
            error!(error = %err, "built-in route registration failed");
            self.stop_engine();
            return Err(err);
        }
        Ok(())
    }

    fn register_builtin_routes(&self) -> io::Result<()> {
        let root = root_handler(self.volume.clone());
        for path in ["/", "/index.html", "/index.htm"] {
            self.register_guarded(path, Method::GET, root.clone(), true)
                .map_err(route_to_io)?;
        }
        let favicon = favicon_handler(self.volume.clone());
        self.register_guarded("/favicon.ico", Method::GET, favicon, true)
            .map_err(route_to_io)
    }

    fn register_guarded(
        &self,
        path: &str,
        method: Method,
        handler: Handler,
        allow_starting: bool,
    ) -> Result<(), RouteError> {
        let Ok(st) = self.shared.state.lock() else {
            return Err(RouteError::OperationFailed);
        };
        let state_ok = st.state == ServiceState::Running
            || (allow_starting && st.state == ServiceState::Starting);
        if !state_ok {
            return Err(RouteError::InvalidState);
        }
        let Some(engine) = st.engine.as_ref() else {
            return Err(RouteError::InvalidState);
        };
        engine
            .register_route(path, method, handler)
            .map_err(RouteError::Engine)
    }

    /// Tear down a startup attempt whose readiness wait expired.
    ///
    /// The worker's commit may have landed just after the deadline; regress
    /// it first so no caller observes `Running` while this attempt is being
    /// dismantled, and take the readiness bit down with it.
    fn abort_attempt(&self) {
        if let Ok(mut st) = self.shared.state.lock() {
            if st.state == ServiceState::Running {
                st.state = ServiceState::Starting;
            }
        }
        self.shared.ready.clear();
        let _ = self.stop_worker();
        self.stop_engine();
    }

    fn stop_engine(&self) {
        let engine = {
            let Ok(mut st) = self.shared.state.lock() else {
                return;
            };
            st.engine.take()
        };
        if let Some(engine) = engine {
            engine.stop();
            info!("engine stopped");
        }
    }

    fn start_worker(&self) -> bool {
        let rx = {
            let Ok(mut st) = self.shared.state.lock() else {
                return false;
            };
            if st.worker.is_some() {
                return true;
            }
            st.worker_exit = false;
            let (tx, rx) = may::sync::mpsc::channel();
            st.worker = Some(tx);
            rx
        };

        if let Err(err) = spawn_worker(
            Arc::clone(&self.shared),
            rx,
            self.config.worker_stack_size,
        ) {
            error!(error = %err, "failed to spawn worker");
            if let Ok(mut st) = self.shared.state.lock() {
                st.worker = None;
            }
            return false;
        }
        true
    }

    /// Signal the worker to exit and poll for its self-reported death.
    /// Bounded: logs a warning and gives up after ~1s.
    fn stop_worker(&self) -> bool {
        let sender = {
            let Ok(mut st) = self.shared.state.lock() else {
                return false;
            };
            if st.worker.is_none() {
                return true;
            }
            st.worker_exit = true;
            st.worker.clone()
        };
        if let Some(tx) = sender {
            let _ = tx.send(WorkerMessage::Wake);
        }

        for _ in 0..STOP_POLL_ATTEMPTS {
            if let Ok(st) = self.shared.state.lock() {
                if st.worker.is_none() {
                    return true;
                }
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
        warn!("worker did not stop within timeout");
        false
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(BACKOFF_CAP)
}

fn route_to_io(err: RouteError) -> io::Error {
    match err {
        RouteError::Engine(inner) => inner,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdleEngine;
    struct IdleHandle;

    impl ProtocolEngine for IdleEngine {
        fn start(&self) -> io::Result<Box<dyn EngineHandle>> {
            Ok(Box::new(IdleHandle))
        }
    }

    impl EngineHandle for IdleHandle {
        fn register_route(&self, _: &str, _: Method, _: Handler) -> io::Result<()> {
            Ok(())
        }
        fn unregister_route(&self, _: &str, _: Method) -> io::Result<()> {
            Ok(())
        }
        fn open_sessions(&self, _: usize) -> io::Result<Vec<crate::server::engine::SessionId>> {
            Ok(Vec::new())
        }
        fn close_session(&self, _: crate::server::engine::SessionId) {}
        fn stop(&self) {}
    }

    #[test]
    fn late_readiness_commit_is_regressed_on_attempt_teardown() {
        let ctrl = ServiceController::new(Arc::new(IdleEngine), ServerConfig::default());

        // Stage the race: the worker's commit lands just after the readiness
        // wait has already expired.
        {
            let mut st = ctrl.shared.state.lock().unwrap();
            st.state = ServiceState::Running;
        }
        ctrl.shared.ready.set();

        ctrl.abort_attempt();

        assert!(!ctrl.is_running());
        assert!(!ctrl.shared.ready.is_set());
        let st = ctrl.shared.state.lock().unwrap();
        assert_eq!(st.state, ServiceState::Starting);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let mut backoff = INITIAL_BACKOFF;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(backoff.as_millis());
            backoff = next_backoff(backoff);
        }
        assert_eq!(seen, vec![50, 100, 200, 400, 800, 1000]);
        assert_eq!(next_backoff(BACKOFF_CAP), BACKOFF_CAP);
    }
}
