use std::io;

/// Map a status code to its status line text.
///
/// The table covers the codes this module actually emits; anything else
/// collapses to a 500 line, matching the engine's behavior for unknown codes.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        204 => "No Content",
        302 => "Found",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        _ => "Internal Server Error",
    }
}

/// Sink a handler writes its response into.
///
/// Abstracts the protocol engine's response object so handlers and the asset
/// streamer can be driven identically by the real engine and by test sinks.
/// Chunked writes are terminated by [`ResponseSink::finish`], which emits the
/// zero-length chunk ending the stream.
pub trait ResponseSink {
    fn set_status(&mut self, status: u16);
    fn set_header(&mut self, name: &str, value: &str);
    /// Append one chunk of body data. Fails if the client went away.
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;
    /// Terminate a chunked body (zero-length chunk).
    fn finish(&mut self) -> io::Result<()>;

    /// Convenience for small non-streamed bodies.
    fn send_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.write_chunk(body)?;
        self.finish()
    }
}

/// Cache-defeating header block applied to every served asset and template.
pub fn set_no_cache_headers(sink: &mut dyn ResponseSink) {
    sink.set_header("Cache-Control", "no-cache, no-store, must-revalidate");
    sink.set_header("Pragma", "no-cache");
    sink.set_header("Expires", "0");
    sink.set_header("Vary", "Accept-Encoding");
}

/// Write a short complete text response.
pub fn send_text(
    sink: &mut dyn ResponseSink,
    status: u16,
    content_type: &str,
    body: &str,
) -> io::Result<()> {
    sink.set_status(status);
    sink.set_header("Content-Type", content_type);
    sink.send_body(body.as_bytes())
}
