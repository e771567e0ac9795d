//! Environment-variable based runtime configuration.
//!
//! ## Environment variables
//!
//! - `HTTPSRV_ADDR`: listen address (default `0.0.0.0:80`)
//! - `HTTPSRV_MAX_ROUTES`: URI handler slots (default 40)
//! - `HTTPSRV_MAX_SOCKETS`: open-socket bound used by the session
//!   terminator (default 16)
//! - `HTTPSRV_STATIC_ENABLE`: serve assets from the static volume
//!   (`1`/`true`, default off)
//! - `HTTPSRV_STATIC_DIR`: volume mount point (default `/www`)
//! - `HTTPSRV_STATIC_LABEL`: volume label used in logs (default `www`)
//! - `HTTPSRV_STACK_SIZE`: worker coroutine stack size in bytes, decimal or
//!   `0x` hex (default `0x10000`, 64 KB)

use std::env;
use tracing::warn;

pub const DEFAULT_MAX_ROUTES: usize = 40;
pub const DEFAULT_MAX_SOCKETS: usize = 16;
pub const DEFAULT_STATIC_DIR: &str = "/www";
pub const DEFAULT_VOLUME_LABEL: &str = "www";
const DEFAULT_STACK_SIZE: usize = 0x10000; // 64KB

/// Configuration consumed by the service controller and the engine.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the protocol engine listens on.
    pub bind_addr: String,
    /// URI handler slots on the engine.
    pub max_routes: usize,
    /// Open-socket bound captured at startup for session enumeration.
    pub max_open_sockets: usize,
    /// Whether the static-asset subsystem is active at all.
    pub static_enabled: bool,
    /// Mount point of the static volume. Must start with `/`; corrected with
    /// a warning if not.
    pub static_dir: String,
    /// Volume label, used in logs. Defaulted with a warning if empty.
    pub volume_label: String,
    /// Stack size for the deferred-work coroutine.
    pub worker_stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:80".to_string(),
            max_routes: DEFAULT_MAX_ROUTES,
            max_open_sockets: DEFAULT_MAX_SOCKETS,
            static_enabled: false,
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            volume_label: DEFAULT_VOLUME_LABEL.to_string(),
            worker_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env::var("HTTPSRV_ADDR").unwrap_or(defaults.bind_addr);

        let max_routes = env::var("HTTPSRV_MAX_ROUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ROUTES);

        let max_open_sockets = env::var("HTTPSRV_MAX_SOCKETS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_SOCKETS);

        let static_enabled = env::var("HTTPSRV_STATIC_ENABLE")
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let static_dir = env::var("HTTPSRV_STATIC_DIR").unwrap_or(defaults.static_dir);
        let volume_label = env::var("HTTPSRV_STATIC_LABEL").unwrap_or(defaults.volume_label);

        let worker_stack_size = env::var("HTTPSRV_STACK_SIZE")
            .ok()
            .and_then(|s| parse_stack_size(&s))
            .unwrap_or(DEFAULT_STACK_SIZE);

        Self {
            bind_addr,
            max_routes,
            max_open_sockets,
            static_enabled,
            static_dir,
            volume_label,
            worker_stack_size,
        }
    }

    /// Apply the documented corrections: a mount point without a leading `/`
    /// is prefixed, an empty mount point or label falls back to its default.
    /// Each correction logs a warning.
    pub fn normalized(mut self) -> Self {
        if self.static_dir.is_empty() {
            warn!(
                default = DEFAULT_STATIC_DIR,
                "static mount point is empty, using default"
            );
            self.static_dir = DEFAULT_STATIC_DIR.to_string();
        } else if !self.static_dir.starts_with('/') {
            warn!(
                configured = %self.static_dir,
                "static mount point is missing leading '/', correcting"
            );
            self.static_dir.insert(0, '/');
        }

        if self.volume_label.is_empty() {
            warn!(
                default = DEFAULT_VOLUME_LABEL,
                "volume label is empty, using default"
            );
            self.volume_label = DEFAULT_VOLUME_LABEL.to_string();
        }

        self
    }
}

fn parse_stack_size(val: &str) -> Option<usize> {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
