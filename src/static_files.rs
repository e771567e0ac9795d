//! Flash-volume-backed static asset serving.
//!
//! The volume is a path-addressable directory mounted at most once per
//! process. Resolution maps a request URI to a physical file, preferring a
//! pre-compressed `.gz` sibling when one exists, and streaming is chunked
//! through the engine's response primitive.

use crate::server::response::{send_text, set_no_cache_headers, ResponseSink};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

const STREAM_CHUNK: usize = 1024;

/// Result of resolving a request URI against the volume. Recomputed per
/// request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub is_gzip: bool,
}

/// Outcome of a serve attempt that did not fail mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeStatus {
    /// A response (including an error response) was written.
    Served,
    /// Nothing on the volume matched; the caller should fall back.
    NotFound,
    /// The volume is unavailable; the caller should fall back.
    NotSupported,
}

/// The mounted static asset volume.
///
/// Mount status is monotonic: once mounted, the volume stays mounted for the
/// process lifetime. The request hot path only reads one atomic flag.
pub struct StaticVolume {
    base_dir: PathBuf,
    label: String,
    mount_lock: Mutex<()>,
    mounted: AtomicBool,
}

impl StaticVolume {
    pub fn new(base_dir: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            label: label.into(),
            mount_lock: Mutex::new(()),
            mounted: AtomicBool::new(false),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Mount the volume if it is not mounted yet. Retries on later calls if
    /// the first attempt failed; never unmounts.
    pub fn ensure_mounted(&self) -> bool {
        if self.mounted.load(Ordering::Acquire) {
            return true;
        }
        let Ok(_guard) = self.mount_lock.lock() else {
            return false;
        };
        if self.mounted.load(Ordering::Acquire) {
            return true;
        }

        match fs::metadata(&self.base_dir) {
            Ok(meta) if meta.is_dir() => {
                let entries = fs::read_dir(&self.base_dir)
                    .map(|it| it.count())
                    .unwrap_or(0);
                info!(
                    label = %self.label,
                    base = %self.base_dir.display(),
                    entries,
                    "static volume mounted"
                );
                self.mounted.store(true, Ordering::Release);
                true
            }
            Ok(_) => {
                warn!(
                    label = %self.label,
                    base = %self.base_dir.display(),
                    "static volume mount failed: not a directory"
                );
                false
            }
            Err(err) => {
                warn!(
                    label = %self.label,
                    base = %self.base_dir.display(),
                    error = %err,
                    "static volume mount failed"
                );
                false
            }
        }
    }

    fn physical(&self, logical: &str) -> PathBuf {
        // logical always starts with '/'; join relative to the mount base
        self.base_dir.join(logical.trim_start_matches('/'))
    }

    /// Resolve a request URI to a physical file on the volume.
    ///
    /// Candidate order: the normalized path, then its `.html`/`.htm` sibling.
    /// For each candidate the pre-compressed `<candidate>.gz` wins over the
    /// plain file; the first hit across the candidate list is taken. The
    /// content type is always derived from the logical (uncompressed) name.
    pub fn resolve(&self, uri: &str) -> Option<ResolvedAsset> {
        if !uri.starts_with('/') {
            return None;
        }
        // Path traversal guard: reject the sequence outright rather than
        // normalizing it away.
        if uri.contains("..") {
            return None;
        }

        let mut logical = uri.to_string();
        if logical.ends_with('/') {
            logical.push_str("index.html");
        }

        // A literal request for the compressed name resolves like the plain
        // name; whether the compressed variant is served depends only on what
        // exists on the volume.
        if logical.ends_with(".gz") && logical.len() > 3 {
            logical.truncate(logical.len() - 3);
        }

        let mut candidates = Vec::with_capacity(2);
        candidates.push(logical.clone());
        if let Some(stem) = logical.strip_suffix(".html") {
            candidates.push(format!("{stem}.htm"));
        } else if let Some(stem) = logical.strip_suffix(".htm") {
            candidates.push(format!("{stem}.html"));
        }

        for candidate in &candidates {
            let gz = self.physical(&format!("{candidate}.gz"));
            if gz.is_file() {
                return Some(ResolvedAsset {
                    path: gz,
                    content_type: content_type_for_path(candidate),
                    is_gzip: true,
                });
            }
            let plain = self.physical(candidate);
            if plain.is_file() {
                return Some(ResolvedAsset {
                    path: plain,
                    content_type: content_type_for_path(candidate),
                    is_gzip: false,
                });
            }
        }

        None
    }

    /// Attempt to answer a request from the volume.
    ///
    /// `Ok(Served)` means a response was written (possibly a 500 for a file
    /// that vanished between resolution and open). `Err` is reserved for
    /// mid-stream write failures, which the engine surfaces to the caller.
    pub fn try_serve(&self, uri: &str, sink: &mut dyn ResponseSink) -> io::Result<ServeStatus> {
        if uri.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty URI"));
        }
        if !self.ensure_mounted() {
            return Ok(ServeStatus::NotSupported);
        }
        let Some(asset) = self.resolve(uri) else {
            return Ok(ServeStatus::NotFound);
        };
        stream_asset(sink, &asset)?;
        Ok(ServeStatus::Served)
    }
}

/// Content type for the logical (pre-`.gz`-strip) file name.
pub fn content_type_for_path(logical: &str) -> &'static str {
    let ext = logical.rsplit('.').next().unwrap_or("");
    match ext {
        "htm" | "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        "woff" => "font/woff",
        "ttf" => "font/ttf",
        _ => "text/plain; charset=utf-8",
    }
}

/// Stream a resolved asset to the sink in fixed-size chunks.
///
/// An open failure is a race against concurrent deletion and is answered with
/// a 500, not propagated; chunk-write failures abort the stream and are.
pub fn stream_asset(sink: &mut dyn ResponseSink, asset: &ResolvedAsset) -> io::Result<()> {
    let mut file = match fs::File::open(&asset.path) {
        Ok(f) => f,
        Err(err) => {
            warn!(path = %asset.path.display(), error = %err, "asset open failed");
            return send_text(
                sink,
                500,
                "text/plain; charset=utf-8",
                "File open failed\n",
            );
        }
    };

    sink.set_status(200);
    sink.set_header("Content-Type", asset.content_type);
    if asset.is_gzip {
        sink.set_header("Content-Encoding", "gzip");
    }
    set_no_cache_headers(sink);

    let mut buf = [0u8; STREAM_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sink.write_chunk(&buf[..n])?;
    }
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_logical_name() {
        assert_eq!(content_type_for_path("/a.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for_path("/a.htm"), "text/html; charset=utf-8");
        assert_eq!(content_type_for_path("/s.css"), "text/css; charset=utf-8");
        assert_eq!(content_type_for_path("/f.woff2"), "font/woff2");
        assert_eq!(
            content_type_for_path("/app.js.map"),
            "application/json; charset=utf-8"
        );
        assert_eq!(
            content_type_for_path("/README"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn rejects_relative_and_traversal_uris() {
        let vol = StaticVolume::new("/nonexistent", "assets");
        assert!(vol.resolve("index.html").is_none());
        assert!(vol.resolve("/../secrets.txt").is_none());
        assert!(vol.resolve("/a/../../b").is_none());
    }
}
