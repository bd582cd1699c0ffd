//! Declarative header forwarding rules, shared by the provider transports
//! (forwarding/rewriting a caller's headers onto the upstream request) and
//! the MCP downstream clients (forwarding a caller's headers onto a tool
//! provider's HTTP/SSE connection).

mod pattern;

use http::{HeaderMap, HeaderName, HeaderValue};
pub use pattern::{NameOrPattern, NamePattern};
use serde::Deserialize;

/// A single header transformation, applied in declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum HeaderRule {
    /// Copies a header from the inbound request onto the outbound one.
    Forward(HeaderForward),
    /// Sets a fixed header value on the outbound request, overwriting any
    /// existing value.
    Insert(HeaderInsert),
    /// Strips a header (by exact name or pattern) from the outbound request.
    Remove(HeaderRemove),
    /// Copies a header under a new name, keeping the original too.
    RenameDuplicate(HeaderRenameDuplicate),
}

/// Forward an inbound header, optionally renaming it and falling back to a
/// default value when the inbound request didn't set it.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderForward {
    /// Inbound header name or pattern to match.
    pub name: NameOrPattern,
    /// Value used when the inbound header is absent.
    #[serde(default)]
    pub default: Option<String>,
    /// Outbound header name; defaults to the matched name.
    #[serde(default)]
    pub rename: Option<String>,
}

/// Unconditionally set a header on the outbound request.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderInsert {
    /// Outbound header name.
    pub name: String,
    /// Outbound header value.
    pub value: String,
}

/// Remove a header before the request leaves Bifrost.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRemove {
    /// Header name or pattern to strip.
    pub name: NameOrPattern,
}

/// Forward a header under both its original and a renamed key.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRenameDuplicate {
    /// Inbound header name to duplicate.
    pub name: String,
    /// Additional outbound header name carrying the same value.
    pub rename: String,
}

/// Applies `rules` in order, reading from `source` (the inbound client
/// request headers) and mutating `target` (the outbound headers being
/// built for the upstream call).
///
/// Rules run in declaration order and later rules can override earlier
/// ones, matching a typical middleware pipeline: forward-then-insert lets
/// an operator forward a header but override it for specific cases.
pub fn apply(rules: &[HeaderRule], source: &HeaderMap, target: &mut HeaderMap) {
    for rule in rules {
        match rule {
            HeaderRule::Forward(rule) => apply_forward(rule, source, target),
            HeaderRule::Insert(rule) => apply_insert(rule, target),
            HeaderRule::Remove(rule) => apply_remove(rule, target),
            HeaderRule::RenameDuplicate(rule) => apply_rename_duplicate(rule, source, target),
        }
    }
}

fn apply_forward(rule: &HeaderForward, source: &HeaderMap, target: &mut HeaderMap) {
    let matches: Vec<(HeaderName, HeaderValue)> = source
        .iter()
        .filter(|(name, _)| rule.name.matches(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if matches.is_empty() {
        if let Some(default) = &rule.default {
            let Some(name) = rule.name.literal_name() else {
                log::warn!("header forward rule has a default but no literal target name, skipping");
                return;
            };

            if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(default)) {
                target.insert(name, value);
            }
        }
        return;
    }

    for (name, value) in matches {
        let out_name = rule.rename.as_deref().unwrap_or(name.as_str());
        if let Ok(out_name) = HeaderName::try_from(out_name) {
            target.insert(out_name, value);
        }
    }
}

fn apply_insert(rule: &HeaderInsert, target: &mut HeaderMap) {
    match (HeaderName::try_from(&rule.name), HeaderValue::from_str(&rule.value)) {
        (Ok(name), Ok(value)) => {
            target.insert(name, value);
        }
        _ => log::warn!("invalid header insert rule for '{}'", rule.name),
    }
}

fn apply_remove(rule: &HeaderRemove, target: &mut HeaderMap) {
    let to_remove: Vec<HeaderName> = target
        .keys()
        .filter(|name| rule.name.matches(name.as_str()))
        .cloned()
        .collect();

    for name in to_remove {
        target.remove(name);
    }
}

fn apply_rename_duplicate(rule: &HeaderRenameDuplicate, source: &HeaderMap, target: &mut HeaderMap) {
    let Some(value) = source.get(rule.name.as_str()) else {
        return;
    };

    if let Ok(rename) = HeaderName::try_from(&rule.rename) {
        target.insert(rename, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(HeaderName::try_from(*name).unwrap(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn forward_copies_matching_header() {
        let source = header_map(&[("x-client-id", "abc")]);
        let mut target = HeaderMap::new();

        let rule = HeaderRule::Forward(HeaderForward {
            name: NameOrPattern::exact("x-client-id"),
            default: None,
            rename: None,
        });

        apply(&[rule], &source, &mut target);
        assert_eq!(target.get("x-client-id").unwrap(), "abc");
    }

    #[test]
    fn forward_uses_default_when_absent() {
        let source = HeaderMap::new();
        let mut target = HeaderMap::new();

        let rule = HeaderRule::Forward(HeaderForward {
            name: NameOrPattern::exact("x-client-id"),
            default: Some("anonymous".to_string()),
            rename: None,
        });

        apply(&[rule], &source, &mut target);
        assert_eq!(target.get("x-client-id").unwrap(), "anonymous");
    }

    #[test]
    fn insert_overwrites_existing_value() {
        let source = HeaderMap::new();
        let mut target = header_map(&[("authorization", "old")]);

        let rule = HeaderRule::Insert(HeaderInsert {
            name: "authorization".to_string(),
            value: "new".to_string(),
        });

        apply(&[rule], &source, &mut target);
        assert_eq!(target.get("authorization").unwrap(), "new");
    }

    #[test]
    fn remove_strips_matching_headers() {
        let source = HeaderMap::new();
        let mut target = header_map(&[("x-internal", "1"), ("x-keep", "1")]);

        let rule = HeaderRule::Remove(HeaderRemove {
            name: NameOrPattern::exact("x-internal"),
        });

        apply(&[rule], &source, &mut target);
        assert!(target.get("x-internal").is_none());
        assert!(target.get("x-keep").is_some());
    }

    #[test]
    fn rename_duplicate_keeps_both_headers() {
        let source = header_map(&[("x-request-id", "42")]);
        let mut target = HeaderMap::new();

        let rule = HeaderRule::RenameDuplicate(HeaderRenameDuplicate {
            name: "x-request-id".to_string(),
            rename: "x-correlation-id".to_string(),
        });

        apply(&[rule], &source, &mut target);
        assert_eq!(target.get("x-correlation-id").unwrap(), "42");
    }
}
