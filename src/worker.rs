//! The deferred-work task and its readiness signal.
//!
//! The task is a single long-lived `may` coroutine. It narrates its own
//! lifecycle boundaries: on entry it commits `Starting -> Running` and sets
//! the readiness signal; on exit it clears the signal and nulls its own wake
//! sender in shared state. No other code path performs either step.

use crate::lifecycle::{ServiceState, Shared};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Work handed off by request handlers so they never block the protocol
/// engine's own tasks.
pub type DeferredJob = Box<dyn FnOnce() + Send>;

/// Message delivered over the worker's wake channel.
pub enum WorkerMessage {
    /// Bare notification; the worker re-checks its exit flag and goes back to
    /// sleep.
    Wake,
    /// A deferred action to run on the worker.
    Job(DeferredJob),
}

pub type WorkerSender = may::sync::mpsc::Sender<WorkerMessage>;
pub type WorkerReceiver = may::sync::mpsc::Receiver<WorkerMessage>;

/// Edge-triggered readiness bit with a blocking wait.
///
/// Set exactly once per successful startup by the worker's commit step;
/// cleared by the lifecycle logic at the start of every startup attempt and
/// on every transition out of `Running`. Deliberately separate from the state
/// lock so no caller ever blocks on the signal while holding the lock.
#[derive(Default)]
pub struct ReadySignal {
    bit: Mutex<bool>,
    cond: Condvar,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        if let Ok(mut bit) = self.bit.lock() {
            *bit = true;
            self.cond.notify_all();
        }
    }

    pub fn clear(&self) {
        if let Ok(mut bit) = self.bit.lock() {
            *bit = false;
        }
    }

    pub fn is_set(&self) -> bool {
        self.bit.lock().map(|bit| *bit).unwrap_or(false)
    }

    /// Block until the bit is set or `timeout` elapses. A zero timeout
    /// degenerates to a poll.
    pub fn wait(&self, timeout: Duration) -> bool {
        let Ok(mut bit) = self.bit.lock() else {
            return false;
        };
        let deadline = Instant::now() + timeout;
        while !*bit {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.cond.wait_timeout(bit, deadline - now) {
                Ok((guard, _)) => bit = guard,
                Err(_) => return false,
            }
        }
        true
    }
}

/// Spawn the deferred-work coroutine.
///
/// The wake sender must already be stored in shared state so the task's
/// self-clear on exit has something to null.
pub(crate) fn spawn_worker(
    shared: Arc<Shared>,
    rx: WorkerReceiver,
    stack_size: usize,
) -> io::Result<()> {
    let builder = may::coroutine::Builder::new()
        .name("httpsrv_worker".to_string())
        .stack_size(stack_size);

    // SAFETY: may::coroutine::Builder::spawn is unsafe because coroutines
    // must not block their scheduler thread on coroutine-unaware primitives
    // for unbounded periods. The worker parks only on its may channel; the
    // std mutexes it takes are held for short bounded sections.
    unsafe { builder.spawn(move || worker_main(&shared, &rx)) }?;
    Ok(())
}

fn worker_main(shared: &Shared, rx: &WorkerReceiver) {
    // Commit point: the only place Running is ever written. Callers cannot
    // observe Running before the task is alive and past its own init. A
    // commit is withheld if exit was already requested, so a task scheduled
    // late cannot resurrect an attempt its starter has given up on.
    if let Ok(mut st) = shared.state.lock() {
        if st.state == ServiceState::Starting && !st.worker_exit {
            st.state = ServiceState::Running;
            shared.ready.set();
            debug!("worker committed readiness");
        }
    }

    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            // All senders gone; nothing can wake us again.
            Err(_) => break,
        };

        let exit = shared
            .state
            .lock()
            .map(|st| st.worker_exit)
            .unwrap_or(true);
        if exit {
            break;
        }

        if let WorkerMessage::Job(job) = msg {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("deferred job panicked");
            }
        }
    }

    // Self-reported death: clear readiness, then null the wake sender. No
    // other code path nulls it, so the stopper and the task can never race a
    // double-finalize.
    shared.ready.clear();
    if let Ok(mut st) = shared.state.lock() {
        st.worker = None;
    }
    debug!("worker exited");
}
