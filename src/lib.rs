//! # httpsrv
//!
//! A lifecycle-managed HTTP control surface in the embedded style: one
//! always-on service that starts deterministically, accepts dynamically
//! registered routes, optionally serves versioned static assets from a
//! flash-style volume, and shuts down without leaking tasks, sockets, or
//! synchronization primitives.
//!
//! ## Architecture
//!
//! - **[`lifecycle`]**: the service state machine. Idempotent
//!   `start`/`stop`, bounded-retry startup with backoff, readiness delegated
//!   to the worker task's own commit step.
//! - **[`worker`]**: the deferred-work coroutine and the edge-triggered
//!   readiness signal; request handlers hand long work here instead of
//!   blocking the protocol engine.
//! - **[`server`]**: the protocol-engine seam (`may_minihttp` behind a
//!   trait) plus the request/response types handlers see.
//! - **[`routes`]**: the bounded exact-match route table.
//! - **[`static_files`]**: volume mount, asset resolution (compressed
//!   variants, extension aliasing, traversal guard) and chunked streaming.
//! - **[`handlers`]** / **[`pages`]**: built-in root and favicon routes with
//!   compiled-in fallbacks.
//! - **[`runtime_config`]**: `HTTPSRV_*` environment configuration.
//!
//! ## Runtime considerations
//!
//! The worker task and the engine's request handlers run on the `may`
//! coroutine runtime; lifecycle operations are called from plain threads and
//! block only on bounded waits. No lifecycle operation holds the state lock
//! across a blocking wait.
//!
//! ## Quick start
//!
//! ```no_run
//! use httpsrv::lifecycle::ServiceController;
//! use httpsrv::runtime_config::ServerConfig;
//! use httpsrv::server::MiniHttpEngine;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = ServerConfig::from_env();
//! let controller = ServiceController::new(Arc::new(MiniHttpEngine::new(&config)), config);
//! controller.start();
//! controller
//!     .wait_until_running(Duration::from_secs(5))
//!     .expect("service did not come up");
//! ```

pub mod handlers;
pub mod lifecycle;
pub mod pages;
pub mod routes;
pub mod runtime_config;
pub mod server;
pub mod static_files;
pub mod worker;

pub use lifecycle::{RouteError, ServiceController, ServiceState, WaitError};
pub use routes::Handler;
pub use runtime_config::ServerConfig;
pub use static_files::{ResolvedAsset, ServeStatus, StaticVolume};
