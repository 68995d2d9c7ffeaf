//! Built-in rules engine for standalone deployments.
//!
//! [`StaticRules`] evaluates the serialized snapshots against the lists from
//! the environment (`BLOCKED_IPS`, `BLOCKED_METHODS`, `BLOCKED_PATTERNS`,
//! `BLOCKED_RESPONSE_STATUSES`). It only reads the tree, like any other engine
//! plugged into the [`RulesEngine`] seam.

use inspectgate_core::arena::Arena;
use inspectgate_core::kv_iter::percent_decode;
use inspectgate_core::serializer::{CLIENT_IP, METHOD, STATUS, URI_RAW};
use inspectgate_core::{
    BlockSpec, FilteringProvider, InspectionProvider, Phase, RulesEngine, Value, Verdict,
};
use tracing::info;

/// Block lists checked against every snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticRules {
    block: BlockSpec,
    blocked_ips: Vec<String>,
    blocked_methods: Vec<String>,
    blocked_patterns: Vec<String>,
    blocked_response_statuses: Vec<u16>,
}

impl StaticRules {
    pub fn new(block: BlockSpec) -> Self {
        Self {
            block,
            ..Default::default()
        }
    }

    /// Rules built from the filtering lists and default block of `config`.
    pub fn from_config<C>(config: &C) -> Self
    where
        C: InspectionProvider + FilteringProvider,
    {
        Self {
            block: config.block_spec().clone(),
            blocked_ips: config.blocked_ips().to_vec(),
            blocked_methods: config.blocked_methods().to_vec(),
            blocked_patterns: config.blocked_patterns().to_vec(),
            blocked_response_statuses: config.blocked_response_statuses().to_vec(),
        }
    }

    pub fn with_blocked_ips(mut self, ips: &[&str]) -> Self {
        self.blocked_ips = ips.iter().map(|ip| ip.to_string()).collect();
        self
    }

    pub fn with_blocked_methods(mut self, methods: &[&str]) -> Self {
        self.blocked_methods = methods.iter().map(|m| m.to_uppercase()).collect();
        self
    }

    pub fn with_blocked_patterns(mut self, patterns: &[&str]) -> Self {
        self.blocked_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_blocked_response_statuses(mut self, statuses: &[u16]) -> Self {
        self.blocked_response_statuses = statuses.to_vec();
        self
    }

    /// Whether any list is non-empty.
    pub fn is_active(&self) -> bool {
        !(self.blocked_ips.is_empty()
            && self.blocked_methods.is_empty()
            && self.blocked_patterns.is_empty()
            && self.blocked_response_statuses.is_empty())
    }

    fn match_request(&self, snapshot: &Value<'_>) -> Option<&'static str> {
        let map = snapshot.as_map();

        if !self.blocked_ips.is_empty()
            && let Some(ip) = map.get(CLIENT_IP).filter(|v| !v.is_null())
            && self.blocked_ips.iter().any(|b| b.as_bytes() == ip.as_bytes())
        {
            return Some("ip");
        }

        if let Some(method) = map.get(METHOD)
            && is_method_blocked(method.as_bytes(), &self.blocked_methods)
        {
            return Some("method");
        }

        if let Some(uri) = map.get(URI_RAW)
            && is_uri_pattern_blocked(uri.as_bytes(), &self.blocked_patterns)
        {
            return Some("pattern");
        }

        None
    }

    fn match_response(&self, snapshot: &Value<'_>) -> Option<&'static str> {
        let status = snapshot.as_map().get(STATUS)?;
        let status: u16 = std::str::from_utf8(status.as_bytes()).ok()?.parse().ok()?;
        self.blocked_response_statuses
            .contains(&status)
            .then_some("status")
    }
}

impl RulesEngine for StaticRules {
    fn evaluate(&self, snapshot: &Value<'_>, phase: Phase) -> Verdict {
        let matched = match phase {
            Phase::Request => self.match_request(snapshot),
            Phase::Response => self.match_response(snapshot),
        };

        match matched {
            Some(rule) => {
                info!(phase = %phase, rule, "Static rule matched");
                Verdict::Block(self.block.clone())
            }
            None => Verdict::Pass,
        }
    }
}

/// Check if HTTP method is blocked
fn is_method_blocked(method: &[u8], blocked_methods: &[String]) -> bool {
    blocked_methods
        .iter()
        .any(|blocked| blocked.as_bytes().eq_ignore_ascii_case(method))
}

/// Check if the URI contains any blocked pattern, before or after
/// percent-decoding (e.g. `.ph%70` for `.php`).
fn is_uri_pattern_blocked(uri: &[u8], blocked_patterns: &[String]) -> bool {
    if blocked_patterns.is_empty() {
        return false;
    }

    let arena = Arena::new();
    let decoded = percent_decode(uri, false, &arena);
    blocked_patterns.iter().any(|pattern| {
        let pattern = pattern.as_bytes();
        contains(uri, pattern) || contains(decoded, pattern)
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspectgate_core::ContentTypePolicy;

    fn request_snapshot<'a>(
        arena: &'a Arena,
        method: &'a [u8],
        uri: &'a [u8],
        ip: Option<&'a [u8]>,
    ) -> Value<'a> {
        let mut root = Value::null();
        let map = root.make_map(3, arena);
        map.push(METHOD, Value::string(method));
        map.push(URI_RAW, Value::string(uri));
        map.push(CLIENT_IP, ip.map_or_else(Value::null, Value::string));
        root
    }

    fn response_snapshot<'a>(arena: &'a Arena, status: &'a [u8]) -> Value<'a> {
        let mut root = Value::null();
        root.make_map(1, arena).push(STATUS, Value::string(status));
        root
    }

    // ===========================================
    // URI pattern tests
    // ===========================================

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_uri_pattern_plain_match() {
        assert!(is_uri_pattern_blocked(b"/path/to/file.php", &patterns(&[".php"])));
        assert!(!is_uri_pattern_blocked(b"/path/to/file", &patterns(&[".php"])));
        assert!(!is_uri_pattern_blocked(b"/anything", &[]));
    }

    #[test]
    fn test_uri_pattern_bypass_attempts() {
        let list = patterns(&[".php", ".env", "/../"]);
        assert!(is_uri_pattern_blocked(b".ph%70", &list));
        assert!(is_uri_pattern_blocked(b"%2eenv", &list));
        assert!(is_uri_pattern_blocked(b"%2F%2e%2e%2Fetc%2Fpasswd", &list));
    }

    #[test]
    fn test_uri_pattern_invalid_escapes_kept() {
        // Sign characters are not hex digits
        assert!(!is_uri_pattern_blocked(b"/%+f", &patterns(&["\x0f"])));
        assert!(is_uri_pattern_blocked(b"/%+f", &patterns(&["%+f"])));
        assert!(is_uri_pattern_blocked(b"/100%", &patterns(&["100%"])));
        assert!(is_uri_pattern_blocked(b"/%GG", &patterns(&["%GG"])));
    }

    #[test]
    fn test_uri_pattern_utf8() {
        assert!(is_uri_pattern_blocked(b"/caf%C3%A9", &patterns(&["café"])));
    }

    // ===========================================
    // Request phase tests
    // ===========================================

    #[test]
    fn test_blocks_listed_ip() {
        let rules = StaticRules::new(BlockSpec::default()).with_blocked_ips(&["203.0.113.7"]);
        let arena = Arena::new();

        let hit = request_snapshot(&arena, b"GET", b"/", Some(&b"203.0.113.7"[..]));
        assert_eq!(
            rules.evaluate(&hit, Phase::Request),
            Verdict::Block(BlockSpec::default())
        );

        let miss = request_snapshot(&arena, b"GET", b"/", Some(&b"203.0.113.8"[..]));
        assert_eq!(rules.evaluate(&miss, Phase::Request), Verdict::Pass);

        let unknown = request_snapshot(&arena, b"GET", b"/", None);
        assert_eq!(rules.evaluate(&unknown, Phase::Request), Verdict::Pass);
    }

    #[test]
    fn test_blocks_listed_method_case_insensitive() {
        let rules = StaticRules::new(BlockSpec::new(405)).with_blocked_methods(&["trace"]);
        let arena = Arena::new();

        let hit = request_snapshot(&arena, b"TRACE", b"/", None);
        assert!(rules.evaluate(&hit, Phase::Request).is_block());

        let miss = request_snapshot(&arena, b"GET", b"/", None);
        assert!(!rules.evaluate(&miss, Phase::Request).is_block());
    }

    #[test]
    fn test_blocks_patterns_after_decoding() {
        let rules = StaticRules::new(BlockSpec::default()).with_blocked_patterns(&[".php", ".env"]);
        let arena = Arena::new();

        for uri in [&b"/index.php"[..], b"/.ph%70", b"/%2eenv?x=1"] {
            let snapshot = request_snapshot(&arena, b"GET", uri, None);
            assert!(rules.evaluate(&snapshot, Phase::Request).is_block());
        }

        let clean = request_snapshot(&arena, b"GET", b"/index.html", None);
        assert!(!rules.evaluate(&clean, Phase::Request).is_block());
    }

    #[test]
    fn test_pattern_matching_is_case_sensitive() {
        let rules = StaticRules::new(BlockSpec::default()).with_blocked_patterns(&[".PHP"]);
        let arena = Arena::new();
        let snapshot = request_snapshot(&arena, b"GET", b"/file.php", None);
        assert!(!rules.evaluate(&snapshot, Phase::Request).is_block());
    }

    #[test]
    fn test_request_rules_ignore_response_phase() {
        let rules = StaticRules::new(BlockSpec::default()).with_blocked_methods(&["TRACE"]);
        let arena = Arena::new();
        let snapshot = response_snapshot(&arena, b"200");
        assert_eq!(rules.evaluate(&snapshot, Phase::Response), Verdict::Pass);
    }

    // ===========================================
    // Response phase tests
    // ===========================================

    #[test]
    fn test_blocks_listed_response_status() {
        let block = BlockSpec::new(502).with_content_type(ContentTypePolicy::Html);
        let rules = StaticRules::new(block.clone()).with_blocked_response_statuses(&[500, 503]);
        let arena = Arena::new();

        let hit = response_snapshot(&arena, b"503");
        assert_eq!(rules.evaluate(&hit, Phase::Response), Verdict::Block(block));

        let miss = response_snapshot(&arena, b"200");
        assert_eq!(rules.evaluate(&miss, Phase::Response), Verdict::Pass);

        let unset = response_snapshot(&arena, b"0");
        assert_eq!(rules.evaluate(&unset, Phase::Response), Verdict::Pass);
    }

    #[test]
    fn test_is_active() {
        assert!(!StaticRules::default().is_active());
        assert!(StaticRules::default().with_blocked_response_statuses(&[500]).is_active());
    }
}
