//! Sensitive-data redaction
//!
//! Recursively scrubs structured log data before it is emitted. Values
//! under a sensitive key are replaced with a fixed sentinel; free-form
//! strings get pattern-based partial redaction (email local parts, long
//! digit runs). Recursion is depth-bounded so pathological inputs cannot
//! hang the logger.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Replacement for values caught by key- or pattern-based redaction
pub const REDACTED: &str = "[REDACTED]";

/// Marker emitted instead of descending past the recursion cap
pub const MAX_DEPTH_MARKER: &str = "[MAX_DEPTH]";

/// Maximum nesting depth redaction will descend into
pub const MAX_DEPTH: usize = 10;

/// A field whose key contains any of these (case-insensitive) is redacted
/// wholesale, regardless of the value's type.
const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "key",
    "authorization",
    "cookie",
    "credit_card",
    "creditcard",
    "cvv",
    "ssn",
    "api_key",
    "apikey",
    "private_key",
    "privatekey",
    "access_token",
    "accesstoken",
    "refresh_token",
    "refreshtoken",
    "jwt",
    "bearer",
    "auth",
    "credentials",
    "pin",
    "otp",
    "verification_code",
];

// Local part kept out of logs, domain preserved for debugging
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})").expect("email regex")
});

// Phone and card numbers: 10-16 consecutive digits
static DIGIT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{10,16}\b").expect("digit run regex"));

/// Redact a structured value for safe logging.
///
/// Both passes are idempotent: sentinels contain neither digits nor a
/// matchable email local part, so redacting already-redacted data yields
/// the same output.
pub fn redact(value: &Value) -> Value {
    redact_at(value, 0)
}

fn redact_at(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(MAX_DEPTH_MARKER.to_string());
    }

    match value {
        Value::String(s) => Value::String(redact_string(s)),
        Value::Array(items) => {
            // Elements have no key, so only pattern-based redaction applies
            Value::Array(items.iter().map(|v| redact_at(v, depth + 1)).collect())
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_at(v, depth + 1));
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn redact_string(s: &str) -> String {
    let masked = EMAIL_RE.replace_all(s, "***@$1");
    DIGIT_RUN_RE.replace_all(&masked, REDACTED).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_key_replaced() {
        let out = redact(&json!({"password": "hunter2", "name": "alice"}));
        assert_eq!(out["password"], REDACTED);
        assert_eq!(out["name"], "alice");
    }

    #[test]
    fn test_key_match_is_case_insensitive() {
        for key in ["Password", "PASSWORD", "passWORD"] {
            let out = redact(&json!({ key: "hunter2" }));
            assert_eq!(out[key], REDACTED, "key {key} should be redacted");
        }
    }

    #[test]
    fn test_key_substring_match() {
        let out = redact(&json!({
            "stripe_api_key": "sk_live_abc",
            "x-authorization-header": "Bearer abc",
            "user_token_hash": 12345
        }));
        assert_eq!(out["stripe_api_key"], REDACTED);
        assert_eq!(out["x-authorization-header"], REDACTED);
        // Non-string values under sensitive keys are replaced too
        assert_eq!(out["user_token_hash"], REDACTED);
    }

    #[test]
    fn test_nested_objects() {
        let out = redact(&json!({
            "payment": {"card": {"cvv": "123", "holder": "alice"}}
        }));
        assert_eq!(out["payment"]["card"]["cvv"], REDACTED);
        assert_eq!(out["payment"]["card"]["holder"], "alice");
    }

    #[test]
    fn test_array_elements_redacted() {
        let out = redact(&json!({
            "attendees": [{"secret": "a"}, {"name": "bob@example.com"}]
        }));
        assert_eq!(out["attendees"][0]["secret"], REDACTED);
        assert_eq!(out["attendees"][1]["name"], "***@example.com");
    }

    #[test]
    fn test_email_local_part_masked() {
        let out = redact(&json!({"note": "contact alice.w+tix@example.co.uk please"}));
        assert_eq!(out["note"], "contact ***@example.co.uk please");
    }

    #[test]
    fn test_long_digit_runs_masked() {
        let out = redact(&json!({"note": "card 4111111111111111 on file, row 42"}));
        assert_eq!(out["note"], format!("card {REDACTED} on file, row 42"));

        // Nine digits is below the mask threshold
        let short = redact(&json!({"note": "order 123456789"}));
        assert_eq!(short["note"], "order 123456789");
    }

    #[test]
    fn test_idempotent() {
        let input = json!({
            "password": "hunter2",
            "email": "alice@example.com",
            "phone": "a 1234567890 b",
            "nested": {"api_key": "mt_abc", "list": [1, "bob@x.io"]}
        });
        let once = redact(&input);
        let twice = redact(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_depth_cap() {
        let mut value = json!("leaf");
        for _ in 0..12 {
            value = json!({ "inner": value });
        }
        let out = redact(&value);

        let mut cursor = &out;
        let mut depth = 0;
        while let Some(inner) = cursor.get("inner") {
            cursor = inner;
            depth += 1;
        }
        assert_eq!(cursor, &Value::String(MAX_DEPTH_MARKER.to_string()));
        assert!(depth <= MAX_DEPTH + 1);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(redact(&json!(42)), json!(42));
        assert_eq!(redact(&json!(true)), json!(true));
        assert_eq!(redact(&Value::Null), Value::Null);
    }
}
