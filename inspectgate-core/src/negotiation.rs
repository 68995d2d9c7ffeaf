//! `Accept`-based choice between the HTML and JSON block bodies.
//!
//! Entries are parsed lazily, one per `,`-separated item. Two trackers, one
//! per body type, remember the most specific matching entry seen so far; a
//! tracker only moves to a strictly more specific entry, so among equally
//! specific entries the first one listed sticks. The tracker with the higher
//! q-value wins, ties go to whichever was listed first, and JSON is the
//! fallback.

use crate::defaults;

/// Block body format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Json,
}

impl ContentType {
    /// `Content-Type` header value.
    pub fn header_value(self) -> &'static str {
        match self {
            ContentType::Html => defaults::CONTENT_TYPE_HTML,
            ContentType::Json => defaults::CONTENT_TYPE_JSON,
        }
    }
}

/// How precisely an entry names a media type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    #[default]
    None,
    /// `*/*`
    Asterisk,
    /// `type/*`
    Partial,
    /// `type/subtype`
    Full,
}

/// One parsed `Accept` item. Parameters other than `q` are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptEntry<'h> {
    pub media_type: &'h [u8],
    pub subtype: &'h [u8],
    pub q: f64,
}

impl<'h> AcceptEntry<'h> {
    pub fn parse(item: &'h [u8]) -> Self {
        let mut entry = AcceptEntry {
            media_type: &[],
            subtype: &[],
            q: 1.0,
        };

        let Some(slash) = item.iter().position(|&b| b == b'/') else {
            return entry;
        };
        entry.media_type = item[..slash].trim_ascii();

        let rest = &item[slash + 1..];
        let Some(semicolon) = rest.iter().position(|&b| b == b';') else {
            entry.subtype = rest.trim_ascii();
            return entry;
        };
        entry.subtype = rest[..semicolon].trim_ascii();
        entry.q = parse_q(&rest[semicolon + 1..]);
        entry
    }

    fn is(&self, media_type: &[u8], subtype: &[u8]) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type)
            && self.subtype.eq_ignore_ascii_case(subtype)
    }
}

/// Extracts `q=` from parameter text. Only the first `q=` counts, and only
/// at the start or after a space. Anything unusable means 1.0.
fn parse_q(params: &[u8]) -> f64 {
    let Some(pos) = params.windows(2).position(|w| w == b"q=") else {
        return 1.0;
    };
    if pos > 0 && params[pos - 1] != b' ' {
        return 1.0;
    }

    let value = &params[pos + 2..];
    let len = value
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b'.'))
        .unwrap_or(value.len());

    std::str::from_utf8(&value[..len])
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|q| q.is_finite() && *q > 0.0 && *q <= 1.0)
        .unwrap_or(1.0)
}

/// Lazy iterator over the entries of an `Accept` value.
#[derive(Debug, Clone)]
pub struct AcceptEntries<'h> {
    rest: Option<&'h [u8]>,
}

impl<'h> AcceptEntries<'h> {
    pub fn new(header: &'h [u8]) -> Self {
        Self { rest: Some(header) }
    }
}

impl<'h> Iterator for AcceptEntries<'h> {
    type Item = AcceptEntry<'h>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        let item = match rest.iter().position(|&b| b == b',') {
            Some(comma) => {
                self.rest = Some(&rest[comma + 1..]);
                &rest[..comma]
            }
            None => {
                self.rest = None;
                rest
            }
        };
        Some(AcceptEntry::parse(item))
    }
}

#[derive(Debug, Default)]
struct Tracker {
    specificity: Specificity,
    q: f64,
    ordinal: usize,
}

impl Tracker {
    fn offer(&mut self, specificity: Specificity, q: f64, ordinal: usize) {
        if specificity > self.specificity {
            *self = Tracker {
                specificity,
                q,
                ordinal,
            };
        }
    }
}

/// Picks the block body format for an `Accept` value; JSON when absent.
///
/// # Example
///
/// ```
/// use inspectgate_core::negotiation::{resolve, ContentType};
///
/// assert_eq!(resolve(Some(&b"text/html,application/json"[..])), ContentType::Html);
/// assert_eq!(resolve(Some(&b"*/*"[..])), ContentType::Json);
/// assert_eq!(resolve(None), ContentType::Json);
/// ```
pub fn resolve(accept: Option<&[u8]>) -> ContentType {
    let Some(accept) = accept else {
        return ContentType::Json;
    };

    let mut html = Tracker::default();
    let mut json = Tracker::default();

    for (ordinal, entry) in AcceptEntries::new(accept).enumerate() {
        if entry.is(b"*", b"*") {
            json.offer(Specificity::Asterisk, entry.q, ordinal);
            html.offer(Specificity::Asterisk, entry.q, ordinal);
        } else if entry.is(b"text", b"*") {
            html.offer(Specificity::Partial, entry.q, ordinal);
        } else if entry.is(b"text", b"html") {
            html.offer(Specificity::Full, entry.q, ordinal);
        } else if entry.is(b"application", b"*") {
            json.offer(Specificity::Partial, entry.q, ordinal);
        } else if entry.is(b"application", b"json") {
            json.offer(Specificity::Full, entry.q, ordinal);
        }
    }

    if html.q > json.q {
        ContentType::Html
    } else if json.q > html.q {
        ContentType::Json
    } else if html.ordinal < json.ordinal {
        ContentType::Html
    } else {
        ContentType::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiate(accept: &str) -> ContentType {
        resolve(Some(accept.as_bytes()))
    }

    // ===========================================
    // Entry parsing tests
    // ===========================================

    #[test]
    fn test_parse_entry() {
        let entry = AcceptEntry::parse(b" text / html ; q=0.7 ");
        assert_eq!(entry.media_type, b"text");
        assert_eq!(entry.subtype, b"html");
        assert_eq!(entry.q, 0.7);
    }

    #[test]
    fn test_parse_entry_without_slash() {
        let entry = AcceptEntry::parse(b"garbage");
        assert!(entry.media_type.is_empty());
        assert!(entry.subtype.is_empty());
        assert_eq!(entry.q, 1.0);
    }

    #[test]
    fn test_q_value_position_rules() {
        assert_eq!(AcceptEntry::parse(b"a/b;q=0.5").q, 0.5);
        assert_eq!(AcceptEntry::parse(b"a/b; q=0.5").q, 0.5);
        assert_eq!(AcceptEntry::parse(b"a/b;level=1;q=0.5").q, 1.0);
        assert_eq!(AcceptEntry::parse(b"a/b;xq=0.5").q, 1.0);
    }

    #[test]
    fn test_invalid_q_values_default_to_one() {
        for params in ["q=", "q=abc", "q=0", "q=0.0", "q=1.5", "q=-1", "q=..", "q=inf"] {
            let item = format!("a/b;{params}");
            assert_eq!(AcceptEntry::parse(item.as_bytes()).q, 1.0, "{params}");
        }
        assert_eq!(AcceptEntry::parse(b"a/b;q=0.25xyz").q, 0.25);
        // qvalue grammar: digits and a dot only, no whitespace or exponent
        assert_eq!(AcceptEntry::parse(b"a/b;q= 0.5").q, 1.0);
        assert_eq!(AcceptEntry::parse(b"a/b;q=5e-1").q, 1.0);
        assert_eq!(AcceptEntry::parse(b"a/b;q=1").q, 1.0);
    }

    #[test]
    fn test_entries_are_lazy_and_ordered() {
        let mut entries = AcceptEntries::new(b"text/html, ,application/json;q=0.9");
        assert_eq!(entries.next().unwrap().subtype, b"html");
        assert!(entries.next().unwrap().media_type.is_empty());
        assert_eq!(entries.next().unwrap().q, 0.9);
        assert!(entries.next().is_none());
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_specificity_order() {
        assert!(Specificity::None < Specificity::Asterisk);
        assert!(Specificity::Asterisk < Specificity::Partial);
        assert!(Specificity::Partial < Specificity::Full);
    }

    // ===========================================
    // resolve tests
    // ===========================================

    #[test]
    fn test_missing_header_is_json() {
        assert_eq!(resolve(None), ContentType::Json);
    }

    #[test]
    fn test_html_listed_first_wins_tie() {
        assert_eq!(negotiate("text/html,application/json"), ContentType::Html);
        assert_eq!(negotiate("application/json,text/html"), ContentType::Json);
    }

    #[test]
    fn test_equal_q_first_listed_wins() {
        assert_eq!(
            negotiate("application/json;q=0.9,text/html;q=0.9"),
            ContentType::Json
        );
        assert_eq!(
            negotiate("text/html;q=0.9,application/json;q=0.9"),
            ContentType::Html
        );
    }

    #[test]
    fn test_wildcard_alone_is_json() {
        assert_eq!(negotiate("*/*"), ContentType::Json);
    }

    #[test]
    fn test_unrelated_types_are_json() {
        assert_eq!(negotiate("application/xml"), ContentType::Json);
        assert_eq!(negotiate("image/png, text/plain"), ContentType::Json);
        assert_eq!(negotiate(""), ContentType::Json);
    }

    #[test]
    fn test_higher_q_wins() {
        assert_eq!(
            negotiate("text/html;q=0.5, application/json;q=0.8"),
            ContentType::Json
        );
        assert_eq!(
            negotiate("application/json;q=0.2, text/*;q=0.3"),
            ContentType::Html
        );
    }

    #[test]
    fn test_more_specific_entry_replaces_wildcard() {
        // html tracker moves from */* (q=0.1) to text/html (q=0.2)
        assert_eq!(negotiate("*/*;q=0.1, text/html;q=0.2"), ContentType::Html);
    }

    #[test]
    fn test_less_specific_entry_does_not_replace() {
        assert_eq!(
            negotiate("application/json;q=0.4, application/*, text/html;q=0.5"),
            ContentType::Html
        );
    }

    #[test]
    fn test_wildcard_then_specific_type() {
        // html keeps */* at position 0, json moves to position 1
        assert_eq!(negotiate("*/*, application/json"), ContentType::Html);
    }

    #[test]
    fn test_browser_accept_header() {
        assert_eq!(
            negotiate("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            ContentType::Html
        );
    }

    #[test]
    fn test_media_types_case_insensitive() {
        assert_eq!(negotiate("TEXT/HTML"), ContentType::Html);
    }

    #[test]
    fn test_header_values() {
        assert_eq!(ContentType::Html.header_value(), "text/html;charset=utf-8");
        assert_eq!(ContentType::Json.header_value(), "application/json");
    }
}
