//! Engine-facing types: the protocol-engine trait seam, the real
//! `may_minihttp` adapter, and the request/response surface handlers see.

pub mod engine;
pub mod minihttp;
pub mod request;
pub mod response;

pub use engine::{EngineHandle, ProtocolEngine, SessionId};
pub use minihttp::MiniHttpEngine;
pub use request::RequestCtx;
pub use response::ResponseSink;
