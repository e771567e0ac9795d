//! Built-in route handlers registered during startup.
//!
//! Both handlers try the static volume first and fall back to the embedded
//! constants in [`crate::pages`], so the root page and icon are always
//! servable even on a blank device.

use crate::pages;
use crate::routes::Handler;
use crate::server::response::{send_text, set_no_cache_headers, ResponseSink};
use crate::static_files::{ServeStatus, StaticVolume};
use std::io;
use std::sync::Arc;

fn try_volume(
    volume: Option<&StaticVolume>,
    uri: &str,
    sink: &mut dyn ResponseSink,
) -> io::Result<ServeStatus> {
    match volume {
        Some(volume) => volume.try_serve(uri, sink),
        None => Ok(ServeStatus::NotSupported),
    }
}

/// Handler for `/`, `/index.html` and `/index.htm`.
pub fn root_handler(volume: Option<Arc<StaticVolume>>) -> Handler {
    Arc::new(move |req, sink| {
        match try_volume(volume.as_deref(), &req.path, sink) {
            Ok(ServeStatus::Served) => Ok(()),
            Ok(ServeStatus::NotFound | ServeStatus::NotSupported) => {
                set_no_cache_headers(sink);
                send_text(sink, 200, "text/html; charset=utf-8", pages::ROOT_PAGE)
            }
            Err(_) => send_text(
                sink,
                500,
                "text/plain; charset=utf-8",
                "Internal file server error\n",
            ),
        }
    })
}

/// Handler for `/favicon.ico`.
pub fn favicon_handler(volume: Option<Arc<StaticVolume>>) -> Handler {
    Arc::new(move |req, sink| {
        match try_volume(volume.as_deref(), &req.path, sink) {
            Ok(ServeStatus::Served) => Ok(()),
            Ok(ServeStatus::NotFound | ServeStatus::NotSupported) => {
                set_no_cache_headers(sink);
                sink.set_status(200);
                sink.set_header("Content-Type", "image/x-icon");
                sink.send_body(&pages::FAVICON_ICO)
            }
            Err(_) => send_text(
                sink,
                500,
                "text/plain; charset=utf-8",
                "Internal file server error\n",
            ),
        }
    })
}
