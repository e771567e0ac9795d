#![allow(dead_code)]

use http::Method;
use httpsrv::routes::{Handler, RouteTable};
use httpsrv::server::engine::{EngineHandle, ProtocolEngine, SessionId};
use httpsrv::server::response::ResponseSink;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Ensures May coroutines are configured only once per test binary.
pub fn setup_may_runtime() {
    use std::sync::Once;
    static MAY_INIT: Once = Once::new();
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

/// Scriptable behavior and observation points for the mock engine.
#[derive(Default)]
pub struct MockBehavior {
    /// Number of `start` calls to fail before succeeding.
    pub fail_starts: AtomicUsize,
    /// Total `start` calls observed (including failed ones).
    pub start_calls: AtomicUsize,
    /// Total `stop` calls observed on handles.
    pub stop_calls: AtomicUsize,
    /// Session ids `open_sessions` reports.
    pub sessions: Mutex<Vec<SessionId>>,
    /// Make `open_sessions` fail.
    pub fail_sessions: AtomicBool,
    /// Session ids force-closed so far.
    pub closed: Mutex<Vec<SessionId>>,
    /// Route table of the most recent started instance.
    pub routes: Mutex<Option<Arc<RwLock<RouteTable>>>>,
}

impl MockBehavior {
    pub fn lookup(&self, path: &str, method: &Method) -> Option<Handler> {
        let table = self.routes.lock().unwrap().clone()?;
        let handler = table.read().unwrap().lookup(path, method);
        handler
    }

    pub fn route_count(&self) -> usize {
        match self.routes.lock().unwrap().clone() {
            Some(table) => table.read().unwrap().len(),
            None => 0,
        }
    }
}

/// Protocol-engine mock driving the lifecycle logic in tests.
pub struct MockEngine {
    pub behavior: Arc<MockBehavior>,
    pub max_routes: usize,
}

impl MockEngine {
    pub fn new(behavior: Arc<MockBehavior>) -> Self {
        Self {
            behavior,
            max_routes: 40,
        }
    }
}

impl ProtocolEngine for MockEngine {
    fn start(&self) -> io::Result<Box<dyn EngineHandle>> {
        self.behavior.start_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.behavior.fail_starts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.behavior.fail_starts.store(remaining - 1, Ordering::SeqCst);
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                "listener not yet released",
            ));
        }

        let routes = Arc::new(RwLock::new(RouteTable::new(self.max_routes)));
        *self.behavior.routes.lock().unwrap() = Some(Arc::clone(&routes));
        Ok(Box::new(MockHandle {
            behavior: Arc::clone(&self.behavior),
            routes,
        }))
    }
}

struct MockHandle {
    behavior: Arc<MockBehavior>,
    routes: Arc<RwLock<RouteTable>>,
}

impl EngineHandle for MockHandle {
    fn register_route(&self, path: &str, method: Method, handler: Handler) -> io::Result<()> {
        self.routes.write().unwrap().register(path, method, handler)
    }

    fn unregister_route(&self, path: &str, method: Method) -> io::Result<()> {
        self.routes.write().unwrap().unregister(path, method)
    }

    fn open_sessions(&self, max: usize) -> io::Result<Vec<SessionId>> {
        if self.behavior.fail_sessions.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "session list unavailable",
            ));
        }
        let sessions = self.behavior.sessions.lock().unwrap();
        Ok(sessions.iter().copied().take(max).collect())
    }

    fn close_session(&self, session: SessionId) {
        self.behavior.closed.lock().unwrap().push(session);
    }

    fn stop(&self) {
        self.behavior.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Response sink recording everything a handler writes, with optional
/// injected chunk-write failures.
pub struct RecordingSink {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub chunk_sizes: Vec<usize>,
    pub finished: bool,
    /// Fail the Nth chunk write (0-based) when set.
    pub fail_on_chunk: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            chunk_sizes: Vec::new(),
            finished: false,
            fail_on_chunk: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ResponseSink for RecordingSink {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        if self.fail_on_chunk == Some(self.chunk_sizes.len()) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
        }
        self.chunk_sizes.push(data.len());
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}
