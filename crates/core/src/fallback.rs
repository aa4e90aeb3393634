//! Static fallback payloads keyed by endpoint pattern
//!
//! Fallback payloads are substitute data, so every object payload carries a
//! `message` field saying so. Rules added without one get the default
//! message at registration time.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_domain::constants::{DEFAULT_FALLBACK_MESSAGE, FALLBACK_MESSAGE_FIELD};
use url::Url;

/// How a rule's pattern is compared with a request URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// URL path starts with the pattern
    #[default]
    Prefix,
    /// Pattern appears anywhere in the URL
    Substring,
}

/// One entry of the fallback table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub pattern: String,
    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,
    pub payload: Value,
}

impl FallbackRule {
    pub fn prefix(pattern: impl Into<String>, payload: Value) -> Self {
        Self { pattern: pattern.into(), match_kind: MatchKind::Prefix, payload }
    }

    pub fn substring(pattern: impl Into<String>, payload: Value) -> Self {
        Self { pattern: pattern.into(), match_kind: MatchKind::Substring, payload }
    }

    fn matches(&self, url: &str) -> bool {
        match self.match_kind {
            MatchKind::Prefix => request_path(url).starts_with(self.pattern.as_str()),
            MatchKind::Substring => url.contains(self.pattern.as_str()),
        }
    }

    fn marked(mut self) -> Self {
        if let Value::Object(map) = &mut self.payload {
            map.entry(FALLBACK_MESSAGE_FIELD)
                .or_insert_with(|| Value::String(DEFAULT_FALLBACK_MESSAGE.to_string()));
        }
        self
    }
}

/// Ordered fallback rules; the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FallbackRule>", into = "Vec<FallbackRule>")]
pub struct FallbackTable {
    rules: Vec<FallbackRule>,
}

impl FallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule (lowest precedence so far).
    pub fn with_rule(mut self, rule: FallbackRule) -> Self {
        self.push(rule);
        self
    }

    pub fn push(&mut self, rule: FallbackRule) {
        self.rules.push(rule.marked());
    }

    /// Payload of the first rule matching `url`.
    pub fn lookup(&self, url: &str) -> Option<&Value> {
        self.rules.iter().find(|rule| rule.matches(url)).map(|rule| &rule.payload)
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<FallbackRule>> for FallbackTable {
    fn from(rules: Vec<FallbackRule>) -> Self {
        Self { rules: rules.into_iter().map(FallbackRule::marked).collect() }
    }
}

impl From<FallbackTable> for Vec<FallbackRule> {
    fn from(table: FallbackTable) -> Self {
        table.rules
    }
}

/// Path component of an absolute URL, or the raw string for relative ones.
fn request_path(url: &str) -> Cow<'_, str> {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => Cow::Owned(parsed.path().to_string()),
        _ => Cow::Borrowed(url),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn articles() -> FallbackTable {
        FallbackTable::new().with_rule(FallbackRule::prefix(
            "/api/articles",
            json!({"success": true, "articles": [], "total": 0}),
        ))
    }

    #[test]
    fn test_prefix_matches_relative_and_absolute_urls() {
        let table = articles();
        assert!(table.lookup("/api/articles").is_some());
        assert!(table.lookup("/api/articles?page=2").is_some());
        assert!(table.lookup("https://example.com/api/articles/7").is_some());
        assert!(table.lookup("/v2/api/articles").is_none());
        assert!(table.lookup("/api/categories").is_none());
    }

    #[test]
    fn test_substring_match() {
        let table = FallbackTable::new().with_rule(FallbackRule::substring("stats", json!([])));
        assert!(table.lookup("https://example.com/admin/stats?range=7d").is_some());
        assert!(table.lookup("/admin/users").is_none());
    }

    /// Validates `FallbackTable::push` behavior for the degraded marker scenario.
    ///
    /// Assertions:
    /// - Confirms a default `message` is added to object payloads.
    /// - Confirms an explicit `message` is preserved.
    /// - Ensures non-object payloads are left untouched.
    #[test]
    fn test_object_payloads_are_marked_degraded() {
        let table = articles()
            .with_rule(FallbackRule::prefix("/api/tips", json!({"message": "Offline tips"})))
            .with_rule(FallbackRule::prefix("/api/tags", json!(["a"])));

        assert_eq!(table.lookup("/api/articles").unwrap()["message"], DEFAULT_FALLBACK_MESSAGE);
        assert_eq!(table.lookup("/api/tips").unwrap()["message"], "Offline tips");
        assert_eq!(table.lookup("/api/tags").unwrap(), &json!(["a"]));
    }

    #[test]
    fn test_first_match_wins() {
        let table = FallbackTable::new()
            .with_rule(FallbackRule::prefix("/api", json!({"which": "broad"})))
            .with_rule(FallbackRule::prefix("/api/articles", json!({"which": "narrow"})));
        assert_eq!(table.lookup("/api/articles").unwrap()["which"], "broad");
    }

    #[test]
    fn test_deserialized_rules_are_marked() {
        let table: FallbackTable = serde_json::from_value(json!([
            {"pattern": "/api/articles", "payload": {"articles": []}},
            {"pattern": "feed", "match": "substring", "payload": {"items": []}}
        ]))
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rules()[1].match_kind, MatchKind::Substring);
        assert_eq!(table.lookup("/x/feed").unwrap()["message"], DEFAULT_FALLBACK_MESSAGE);
    }
}
