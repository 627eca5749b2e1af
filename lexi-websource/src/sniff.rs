//! HTML-aware charset detection for fetched bytes.
//!
//! Precedence: byte-order mark, then the `Content-Type` charset parameter,
//! then a `<meta>` scan over the first KiB of the body, then UTF-8 with
//! lossy replacement. Labels resolve through the WHATWG registry.

use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;

const META_SCAN_LIMIT: usize = 1024;

fn meta_charset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-zA-Z0-9._:-]+)"#)
            .expect("hard-coded regex")
    })
}

/// Decode fetched bytes to text.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| content_type.and_then(header_charset))
        .or_else(|| meta_charset(&bytes[..bytes.len().min(META_SCAN_LIMIT)]))
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Charset parameter of a `Content-Type` header value, if present and known.
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let param = param.trim();
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches(|c| c == '"' || c == '\'');
        Encoding::for_label(label.as_bytes())
    })
}

/// Best-effort `<meta charset=...>` / `http-equiv` sniff over the body
/// prefix. The prefix is decoded lossily as UTF-8 purely to run the regex;
/// charset labels are ASCII, so a mislabeled prefix cannot corrupt the match.
fn meta_charset(prefix: &[u8]) -> Option<&'static Encoding> {
    let text = String::from_utf8_lossy(prefix);
    let caps = meta_charset_re().captures(&text)?;
    Encoding::for_label(caps.get(1)?.as_str().as_bytes())
}
