//! Unsafe-key assertion: prototype-pollution-style rejection.
//!
//! JSON values in Rust cannot structurally carry functions, symbols, or a
//! mutable `__proto__` the way a JS object can, so "evidence of prototype
//! tampering" reduces here to: no object key anywhere in the tree is one of
//! the reserved names. Depth is still bounded, since a caller-controlled
//! tree can be made arbitrarily deep regardless of language.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_MAX_DEPTH: usize = 50;
const UNSAFE_KEYS: [&str; 3] = ["__proto__", "prototype", "constructor"];

/// Walks `value`, rejecting any object key in the unsafe-key set and any
/// subtree deeper than `max_depth`. Applies to inbound request bodies,
/// tool inputs/outputs, LLM-parsed output, and world-model facts.
pub fn assert_safe_object(value: &Value, max_depth: usize) -> Result<()> {
    walk(value, 0, max_depth)
}

fn walk(value: &Value, depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        bail!("Invalid payload: exceeds maximum depth {}", max_depth);
    }
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if UNSAFE_KEYS.contains(&key.as_str()) {
                    bail!("Invalid payload: unsafe key '{}'", key);
                }
                walk(v, depth + 1, max_depth)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, max_depth)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_proto_key() {
        let value = json!({"__proto__": {"polluted": true}});
        assert!(assert_safe_object(&value, DEFAULT_MAX_DEPTH).is_err());
    }

    #[test]
    fn test_rejects_constructor_key_nested() {
        let value = json!({"a": {"b": {"constructor": 1}}});
        assert!(assert_safe_object(&value, DEFAULT_MAX_DEPTH).is_err());
    }

    #[test]
    fn test_accepts_ordinary_object() {
        let value = json!({"a": 1, "b": [1, 2, {"c": "d"}]});
        assert!(assert_safe_object(&value, DEFAULT_MAX_DEPTH).is_ok());
    }

    fn nested(depth: usize) -> Value {
        let mut v = json!("leaf");
        for _ in 0..depth {
            v = json!({ "n": v });
        }
        v
    }

    #[test]
    fn test_depth_exactly_at_limit_is_accepted() {
        let value = nested(DEFAULT_MAX_DEPTH);
        assert!(assert_safe_object(&value, DEFAULT_MAX_DEPTH).is_ok());
    }

    #[test]
    fn test_depth_over_limit_is_rejected() {
        let value = nested(DEFAULT_MAX_DEPTH + 1);
        assert!(assert_safe_object(&value, DEFAULT_MAX_DEPTH).is_err());
    }
}
