use crate::routes::Handler;
use http::Method;
use std::io;

/// Identifier of a live client session on the engine.
pub type SessionId = i32;

/// Factory seam for the externally owned protocol engine.
///
/// The lifecycle logic only ever starts the engine, registers routes on it,
/// enumerates its sessions, and stops it; everything else (accepting
/// connections, parsing, response writing) is the engine's business. The real
/// implementation wraps `may_minihttp`; tests drive the lifecycle through a
/// scriptable mock.
pub trait ProtocolEngine: Send + Sync {
    /// Start the engine. Returns a handle owning the listener; dropping or
    /// stopping the handle releases the port.
    fn start(&self) -> io::Result<Box<dyn EngineHandle>>;
}

/// A running protocol-engine instance. Shared by snapshot between the
/// lifecycle logic and the session terminator, so implementations use
/// interior mutability for their own teardown bookkeeping.
pub trait EngineHandle: Send + Sync {
    fn register_route(&self, path: &str, method: Method, handler: Handler) -> io::Result<()>;
    fn unregister_route(&self, path: &str, method: Method) -> io::Result<()>;

    /// Enumerate live client sessions, bounded by `max`. An error here aborts
    /// the caller's whole enumerate-and-close pass.
    fn open_sessions(&self, max: usize) -> io::Result<Vec<SessionId>>;

    /// Force-close one session. Best effort.
    fn close_session(&self, session: SessionId);

    /// Stop the engine and release the listener. Idempotent.
    fn stop(&self);
}
