//! Utility functions with platform-specific implementations.

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as milliseconds since the Unix epoch.
///
/// On native platforms, uses `SystemTime::now()`.
/// On WASM, uses `js_sys::Date::now()`.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> i64 {
    // js_sys::Date::now() returns milliseconds as f64
    js_sys::Date::now() as i64
}

/// Format epoch milliseconds as an RFC 3339 UTC timestamp with millisecond
/// precision (`2024-05-01T12:00:00.000Z`), the shape `Date.toISOString()` has.
pub fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (BOM handled by encoding_rs), then the hint encoding
/// (usually from `<meta charset>`), then Windows-1252, which is what browsers
/// assume for legacy pages.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Decode a whole page, using its `<meta charset>` as the hint when the
/// bytes are not UTF-8.
pub fn decode_html(bytes: &[u8]) -> Cow<'_, str> {
    decode_text(bytes, extract_meta_charset(bytes))
}

/// Extract the charset label from a `<meta charset=...>` or
/// `<meta http-equiv="Content-Type" content="...; charset=...">` near the
/// start of the document.
///
/// Only the first 1024 bytes are checked, as in the HTML prescan.
pub fn extract_meta_charset(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(1024)];
    let lower = prefix.to_ascii_lowercase();

    let pos = memchr::memmem::find(&lower, b"charset=")?;
    let after = &prefix[pos + b"charset=".len()..];
    let after = match after.first() {
        Some(b'"' | b'\'') => &after[1..],
        _ => after,
    };

    let end = after
        .iter()
        .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'>' | b'/') || b.is_ascii_whitespace())
        .unwrap_or(after.len());

    std::str::from_utf8(&after[..end])
        .ok()
        .filter(|label| !label.is_empty())
}

/// The literal doctype declaration the document starts with, if any.
///
/// Leading whitespace and a UTF-8 BOM are skipped. The parser normalizes the
/// doctype, so this is kept to write the author's original spelling back.
pub fn doctype_prefix(html: &str) -> Option<&str> {
    let start = html.trim_start_matches('\u{feff}').trim_start();
    let head = start.get(..9)?;
    if !head.eq_ignore_ascii_case("<!doctype") {
        return None;
    }
    let end = memchr::memchr(b'>', start.as_bytes())?;
    Some(&start[..=end])
}

/// Whether a class or id can be written into a selector without escaping.
///
/// Plain CSS identifiers only: `[A-Za-z0-9_-]`, not starting with a digit or
/// a hyphen followed by a digit.
pub fn is_css_identifier(s: &str) -> bool {
    let bytes = s.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };
    if first.is_ascii_digit() {
        return false;
    }
    if first == b'-' && bytes.get(1).is_none_or(|b| b.is_ascii_digit()) {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_has_millisecond_precision() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_714_564_800_123), "2024-05-01T12:00:00.123Z");
    }

    #[test]
    fn test_decode_text_utf8_and_fallback() {
        assert_eq!(decode_text("café".as_bytes(), None), "café");
        // 0xE9 is "é" in Windows-1252 and malformed UTF-8
        assert_eq!(decode_text(b"caf\xe9", None), "café");
        assert_eq!(decode_text(b"caf\xe9", Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_extract_meta_charset() {
        assert_eq!(
            extract_meta_charset(br#"<html><head><meta charset="windows-1252">"#),
            Some("windows-1252")
        );
        assert_eq!(
            extract_meta_charset(
                br#"<meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1">"#
            ),
            Some("ISO-8859-1")
        );
        assert_eq!(extract_meta_charset(b"<html><body>no meta</body></html>"), None);
    }

    #[test]
    fn test_decode_html_uses_meta_charset() {
        let latin1 = b"<meta charset=\"iso-8859-15\"><p>\xa4 5</p>";
        assert_eq!(decode_html(latin1), "<meta charset=\"iso-8859-15\"><p>\u{20ac} 5</p>");
        assert_eq!(decode_html("<p>café</p>".as_bytes()), "<p>café</p>");
        assert_eq!(decode_html(b"<p>caf\xe9</p>"), "<p>café</p>");
    }

    #[test]
    fn test_doctype_prefix() {
        assert_eq!(doctype_prefix("<!DOCTYPE html>\n<html>"), Some("<!DOCTYPE html>"));
        assert_eq!(doctype_prefix("\u{feff}  <!doctype html><p>"), Some("<!doctype html>"));
        assert_eq!(
            doctype_prefix(r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN">x"#),
            Some(r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN">"#)
        );
        assert_eq!(doctype_prefix("<html></html>"), None);
        assert_eq!(doctype_prefix("<!DOC"), None);
    }

    #[test]
    fn test_is_css_identifier() {
        assert!(is_css_identifier("logo-text"));
        assert!(is_css_identifier("_private"));
        assert!(is_css_identifier("-webkit-thing"));
        assert!(!is_css_identifier(""));
        assert!(!is_css_identifier("2col"));
        assert!(!is_css_identifier("-2"));
        assert!(!is_css_identifier("md:flex"));
        assert!(!is_css_identifier("w-1/2"));
    }
}
