//! Compiled-in fallback assets.
//!
//! Served whenever the static volume is disabled, unmounted, or missing the
//! requested file, so a freshly flashed device always answers `/` and
//! `/favicon.ico` with something sensible.

/// Minimal root page shown when no `index.html` exists on the volume.
pub const ROOT_PAGE: &str = "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
  <meta charset=\"utf-8\">\n\
  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
  <title>Device</title>\n\
</head>\n\
<body>\n\
  <h1>Device is running</h1>\n\
  <p>No web interface has been installed on the static volume.</p>\n\
</body>\n\
</html>\n";

/// A valid 1x1 transparent 32-bit icon (ICONDIR + ICONDIRENTRY + BMP data).
pub const FAVICON_ICO: [u8; 70] = [
    // ICONDIR: reserved, type 1 (icon), one image
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00,
    // ICONDIRENTRY: 1x1, 0 palette colors, 1 plane, 32 bpp,
    // 48 bytes of data at offset 22
    0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x20, 0x00, 0x30, 0x00, 0x00, 0x00, 0x16, 0x00, 0x00,
    0x00,
    // BITMAPINFOHEADER: 40-byte header, 1x2 (XOR + AND rows), 1 plane,
    // 32 bpp, uncompressed, 8 bytes of pixel data
    0x28, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x20,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // XOR pixel (BGRA, fully transparent)
    0x00, 0x00, 0x00, 0x00,
    // AND mask row (padded to 4 bytes)
    0x00, 0x00, 0x00, 0x00,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_page_is_complete_html() {
        assert!(ROOT_PAGE.starts_with("<!DOCTYPE html>"));
        assert!(ROOT_PAGE.contains("</html>"));
    }

    #[test]
    fn favicon_has_icon_signature() {
        // reserved=0, type=1, count=1
        assert_eq!(&FAVICON_ICO[..6], &[0x00, 0x00, 0x01, 0x00, 0x01, 0x00]);
        // data offset points just past the directory entry
        assert_eq!(FAVICON_ICO[18], 0x16);
        assert_eq!(FAVICON_ICO.len(), 70);
    }
}
