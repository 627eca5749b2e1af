//! URL template resolution.
//!
//! A source's URL template may carry placeholder tokens that stand for the
//! lookup word in a particular text encoding. Community-maintained lookup
//! sites frequently expect their query string in a legacy single- or
//! multi-byte charset, so the same word is offered in every encoding the
//! template asks for. Resolution is pure: no I/O, no failure mode.

use std::sync::OnceLock;

use encoding_rs::Encoding;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};

/// Token replaced with the percent-encoded UTF-8 form of the lookup word.
pub const WORD_TOKEN: &str = "%LXWORD%";

/// Escape everything except RFC 3986 unreserved characters.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Placeholder token -> legacy encoding. Built once, read-only afterwards.
///
/// Labels resolve through the WHATWG registry (`encoding_rs`); a label with
/// no encoding is skipped at build time, which leaves its token literal in
/// resolved URLs. ISO-8859-11 and -12 were never assigned and are not
/// generated at all.
fn substitution_table() -> &'static [(String, &'static Encoding)] {
    static TABLE: OnceLock<Vec<(String, &'static Encoding)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::new();

        let named: [(&str, &str); 5] = [
            ("%LX1251%", "windows-1251"),
            ("%LXBIG5%", "big5"),
            // The WHATWG registry folds Big5-HKSCS into Big5; the token stays
            // distinct so existing templates keep resolving.
            ("%LXBIG5HKSCS%", "big5-hkscs"),
            ("%LXSHIFTJIS%", "shift_jis"),
            ("%LXGBK%", "gb18030"),
        ];
        for (token, label) in named {
            if let Some(enc) = Encoding::for_label(label.as_bytes()) {
                table.push((token.to_string(), enc));
            }
        }

        for n in (1..=16).filter(|n| *n != 11 && *n != 12) {
            let label = format!("iso-8859-{n}");
            if let Some(enc) = Encoding::for_label(label.as_bytes()) {
                table.push((format!("%LXISO{n}%"), enc));
            }
        }

        table
    })
}

/// Resolve a URL template against a lookup word.
///
/// A non-empty `context` is an already-resolved URL (typically a link the
/// user followed inside a previously fetched article) and is returned
/// verbatim, bypassing templating entirely. Otherwise every recognized
/// placeholder token is substituted with the word transcoded into the
/// matching encoding and percent-encoded. Tokens whose encoding is
/// unavailable stay literal: the URL is degraded but resolution never fails.
pub fn resolve_url(template: &str, word: &str, context: Option<&str>) -> String {
    if let Some(ctx) = context {
        if !ctx.is_empty() {
            return ctx.to_string();
        }
    }

    let mut url = template.replace(
        WORD_TOKEN,
        &percent_encode(word.as_bytes(), QUERY_VALUE).to_string(),
    );

    for (token, encoding) in substitution_table() {
        if !url.contains(token.as_str()) {
            continue;
        }
        let (bytes, _, _) = encoding.encode(word);
        let escaped = percent_encode(&bytes, QUERY_VALUE).to_string();
        url = url.replace(token.as_str(), &escaped);
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_token_is_percent_encoded_utf8() {
        let url = resolve_url("https://d.example.com/define?w=%LXWORD%", "café", None);
        assert_eq!(url, "https://d.example.com/define?w=caf%C3%A9");
    }

    #[test]
    fn unreserved_characters_stay_literal() {
        let url = resolve_url("https://d.example.com/%LXWORD%", "a-b.c_d~e", None);
        assert_eq!(url, "https://d.example.com/a-b.c_d~e");
    }

    #[test]
    fn spaces_are_escaped() {
        let url = resolve_url("https://d.example.com/?q=%LXWORD%", "two words", None);
        assert_eq!(url, "https://d.example.com/?q=two%20words");
    }

    #[test]
    fn cyrillic_token_uses_windows_1251() {
        // "да" is 0xE4 0xE0 in windows-1251.
        let url = resolve_url("https://gramota.example.ru/?s=%LX1251%", "да", None);
        assert_eq!(url, "https://gramota.example.ru/?s=%E4%E0");
    }

    #[test]
    fn big5_token_transcodes() {
        // U+4E2D is 0xA4 0xA4 in Big5.
        let url = resolve_url("https://tw.example.com/?q=%LXBIG5%", "中", None);
        assert_eq!(url, "https://tw.example.com/?q=%A4%A4");
    }

    #[test]
    fn hebrew_iso_8859_8_token_transcodes() {
        // Alef is 0xE0 in ISO-8859-8.
        let url = resolve_url("https://he.example.com/?q=%LXISO8%", "א", None);
        assert_eq!(url, "https://he.example.com/?q=%E0");
    }

    #[test]
    fn nonexistent_iso_members_stay_literal() {
        let url = resolve_url(
            "https://x.example.com/?a=%LXISO11%&b=%LXISO12%",
            "word",
            None,
        );
        assert_eq!(url, "https://x.example.com/?a=%LXISO11%&b=%LXISO12%");
    }

    #[test]
    fn multiple_tokens_resolve_in_one_pass() {
        let url = resolve_url(
            "https://multi.example.com/?u=%LXWORD%&r=%LX1251%",
            "да",
            None,
        );
        assert_eq!(url, "https://multi.example.com/?u=%D0%B4%D0%B0&r=%E4%E0");
    }

    #[test]
    fn unrecognized_tokens_are_untouched() {
        let url = resolve_url("https://x.example.com/?q=%SOMETHINGELSE%", "word", None);
        assert_eq!(url, "https://x.example.com/?q=%SOMETHINGELSE%");
    }

    #[test]
    fn context_bypasses_templating() {
        let url = resolve_url(
            "https://d.example.com/?q=%LXWORD%",
            "ignored",
            Some("https://d.example.com/already/resolved"),
        );
        assert_eq!(url, "https://d.example.com/already/resolved");
    }

    #[test]
    fn empty_context_falls_back_to_template() {
        let url = resolve_url("https://d.example.com/?q=%LXWORD%", "cat", Some(""));
        assert_eq!(url, "https://d.example.com/?q=cat");
    }

    #[test]
    fn template_without_tokens_is_returned_as_is() {
        let url = resolve_url("https://static.example.com/page", "cat", None);
        assert_eq!(url, "https://static.example.com/page");
    }
}
