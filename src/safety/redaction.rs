//! Structured redaction of sensitive fields in audit logs.
//!
//! Generalizes this codebase's `ContentFilter::check_output` (a flat list
//! of secret-shaped regexes run over a single string) into a recursive
//! object walk that redacts by key and, within string leaves, by pattern.
//!
//! `serde_json::Value` is always tree-shaped (no shared/aliased nodes), so
//! a literal reference cycle cannot occur here; the "cycle detection" the
//! design calls for is realized as a depth bound that substitutes the
//! `"[CIRCULAR]"` sentinel once a configured nesting depth is exceeded,
//! which is the only way an externally supplied tree can simulate
//! unbounded self-reference in this representation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

pub const REDACTED: &str = "[REDACTED]";
pub const CIRCULAR: &str = "[CIRCULAR]";
const DEFAULT_MAX_DEPTH: usize = 64;

pub fn default_sensitive_keys() -> HashSet<String> {
    [
        "password", "secret", "apikey", "api_key", "token", "access_token", "refresh_token",
        "key", "credential", "auth", "authorization", "bearer", "session", "cookie", "ssn",
        "credit_card", "card_number", "pin", "pii",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct RedactionOptions {
    /// Lowercased substrings; a key containing any of these is redacted.
    pub sensitive_keys: HashSet<String>,
    /// When set, only keys with an exact (case-insensitive) match in this
    /// set are retained unredacted; everything else is redacted regardless
    /// of `sensitive_keys`. Exact match only — substring matching here
    /// would let an allowlisted `id` leak through a field named `id_token`.
    pub allowlist: Option<HashSet<String>>,
    pub max_depth: usize,
}

impl Default for RedactionOptions {
    fn default() -> Self {
        Self { sensitive_keys: default_sensitive_keys(), allowlist: None, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl RedactionOptions {
    fn is_sensitive_key(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        if let Some(allowlist) = &self.allowlist {
            !allowlist.iter().any(|allowed| allowed.eq_ignore_ascii_case(&lower))
        } else {
            self.sensitive_keys.iter().any(|s| lower.contains(s.as_str()))
        }
    }
}

static KV_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let keys = default_sensitive_keys().into_iter().collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)\b({keys})\b\s*[:=]\s*\S+")).unwrap()
});

static BARE_TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Za-z0-9_\-]{20,}\b").unwrap());

static UUID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap());

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").unwrap());

fn redact_string(s: &str) -> String {
    let mut result = KV_PATTERN.replace_all(s, REDACTED).to_string();

    result = BARE_TOKEN_PATTERN
        .replace_all(&result, |caps: &regex::Captures| {
            let candidate = &caps[0];
            if UUID_PATTERN.is_match(candidate) || URL_PATTERN.is_match(candidate) {
                candidate.to_string()
            } else {
                REDACTED.to_string()
            }
        })
        .to_string();

    result
}

pub fn redact(value: &Value, options: &RedactionOptions) -> Value {
    redact_at(value, options, 0)
}

fn redact_at(value: &Value, options: &RedactionOptions, depth: usize) -> Value {
    if depth > options.max_depth {
        return Value::String(CIRCULAR.to_string());
    }

    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, v) in map {
                if options.is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_at(v, options, depth + 1));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_at(v, options, depth + 1)).collect()),
        Value::String(s) => Value::String(redact_string(s)),
        other => other.clone(),
    }
}
