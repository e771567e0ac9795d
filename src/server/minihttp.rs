//! Protocol engine implementation over `may_minihttp`.
//!
//! The engine owns its own accept/parse/respond coroutines; this adapter only
//! starts it, feeds it a request service that consults the shared route
//! table, and cancels it on stop.

use crate::routes::{Handler, RouteTable};
use crate::runtime_config::ServerConfig;
use crate::server::engine::{EngineHandle, ProtocolEngine, SessionId};
use crate::server::request::parse_request;
use crate::server::response::{send_text, status_reason, ResponseSink};
use http::Method;
use may_minihttp::{HttpServer, HttpService, Request, Response};
use std::io;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Factory for the real `may_minihttp`-backed engine.
pub struct MiniHttpEngine {
    bind_addr: String,
    max_routes: usize,
}

impl MiniHttpEngine {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            max_routes: config.max_routes,
        }
    }
}

impl ProtocolEngine for MiniHttpEngine {
    fn start(&self) -> io::Result<Box<dyn EngineHandle>> {
        let routes = Arc::new(RwLock::new(RouteTable::new(self.max_routes)));
        let service = AppService {
            routes: Arc::clone(&routes),
        };
        let join = HttpServer(service).start(self.bind_addr.as_str())?;
        info!(addr = %self.bind_addr, "http engine listening");
        Ok(Box::new(MiniHttpHandle {
            routes,
            join: Mutex::new(Some(join)),
        }))
    }
}

struct MiniHttpHandle {
    routes: Arc<RwLock<RouteTable>>,
    join: Mutex<Option<may::coroutine::JoinHandle<()>>>,
}

impl EngineHandle for MiniHttpHandle {
    fn register_route(&self, path: &str, method: Method, handler: Handler) -> io::Result<()> {
        let Ok(mut routes) = self.routes.write() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "route table unavailable",
            ));
        };
        routes.register(path, method, handler)
    }

    fn unregister_route(&self, path: &str, method: Method) -> io::Result<()> {
        let Ok(mut routes) = self.routes.write() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "route table unavailable",
            ));
        };
        routes.unregister(path, method)
    }

    fn open_sessions(&self, _max: usize) -> io::Result<Vec<SessionId>> {
        // may_minihttp does not expose per-session descriptors; report no
        // sessions so the terminator degrades to a no-op.
        Ok(Vec::new())
    }

    fn close_session(&self, _session: SessionId) {}

    fn stop(&self) {
        let join = self.join.lock().ok().and_then(|mut guard| guard.take());
        if let Some(join) = join {
            // SAFETY: cancelling the accept coroutine is the engine's
            // documented shutdown path; the handle is owned here and joined
            // immediately after.
            unsafe {
                join.coroutine().cancel();
            }
            let _ = join.join();
        }
    }
}

/// Request service run by the engine's coroutines. Unknown routes are
/// rejected by the engine with a plain 404.
#[derive(Clone)]
struct AppService {
    routes: Arc<RwLock<RouteTable>>,
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let ctx = parse_request(
            req.method(),
            req.path(),
            req.headers().iter().map(|h| (h.name, h.value)),
        );

        let handler = {
            let Ok(routes) = self.routes.read() else {
                let mut sink = BufferedSink::new();
                let _ = send_text(
                    &mut sink,
                    500,
                    "text/plain; charset=utf-8",
                    "Internal server error\n",
                );
                sink.apply(res);
                return Ok(());
            };
            routes.lookup(&ctx.path, &ctx.method)
        };

        let mut sink = BufferedSink::new();
        let outcome = match handler {
            Some(handler) => handler(&ctx, &mut sink),
            None => {
                debug!(method = %ctx.method, path = %ctx.path, "no route registered");
                send_text(&mut sink, 404, "text/plain; charset=utf-8", "Not Found\n")
            }
        };

        if let Err(err) = outcome {
            warn!(path = %ctx.path, error = %err, "handler failed mid-response");
            return Err(err);
        }

        sink.apply(res);
        Ok(())
    }
}

/// Buffers a handler's response and replays it onto the engine's response
/// object. The engine writes the wire format itself, so "chunks" here are
/// body appends; the zero-length terminator is implicit in `apply`.
struct BufferedSink {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    finished: bool,
}

impl BufferedSink {
    fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            finished: false,
        }
    }

    fn apply(self, res: &mut Response) {
        res.status_code(self.status as usize, status_reason(self.status));
        for (name, value) in self.headers {
            // may_minihttp takes &'static str headers; same leak the
            // engine's other users accept for dynamic values.
            let header = format!("{name}: {value}").into_boxed_str();
            res.header(Box::leak(header));
        }
        res.body_vec(self.body);
    }
}

impl ResponseSink for BufferedSink {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "response already finished",
            ));
        }
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}
