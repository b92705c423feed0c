//! API tracking identifiers (`info.x-api-id`)
//!
//! Format: `<prefix>_<13-digit millisecond timestamp>_<16 lowercase hex>`,
//! e.g. `acct_1699999999999_deadbeefcafebabe`.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

static API_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn api_id_pattern() -> &'static Regex {
    API_ID_PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+_[0-9]{13}_[a-f0-9]{16}$").expect("API id pattern is valid")
    })
}

/// A well-formed API tracking identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiId {
    pub prefix: String,
    /// Millisecond timestamp encoded in the identifier
    pub issued_ms: i64,
    pub nonce: String,
}

impl ApiId {
    pub fn parse(raw: &str) -> Option<ApiId> {
        if !api_id_pattern().is_match(raw) {
            return None;
        }
        let mut parts = raw.split('_');
        let prefix = parts.next()?.to_string();
        let issued_ms = parts.next()?.parse().ok()?;
        let nonce = parts.next()?.to_string();
        Some(ApiId {
            prefix,
            issued_ms,
            nonce,
        })
    }

    /// Issue time, when the timestamp is representable
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.issued_ms)
    }
}

pub fn is_valid_api_id(raw: &str) -> bool {
    api_id_pattern().is_match(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifier() {
        let id = ApiId::parse("acct_1699999999999_deadbeefcafebabe").expect("valid id");
        assert_eq!(id.prefix, "acct");
        assert_eq!(id.issued_ms, 1_699_999_999_999);
        assert_eq!(id.nonce, "deadbeefcafebabe");
        let issued = id.issued_at().expect("representable");
        assert_eq!(issued.format("%Y-%m-%d").to_string(), "2023-11-14");
    }

    #[test]
    fn test_invalid_identifiers() {
        for raw in [
            "bad-id",
            "",
            "ACCT_1699999999999_deadbeefcafebabe",
            "acct_169999999999_deadbeefcafebabe",
            "acct_1699999999999_DEADBEEFCAFEBABE",
            "acct_1699999999999_deadbeefcafebab",
            "acct-x_1699999999999_deadbeefcafebabe",
            "acct_1699999999999_deadbeefcafebabe\n",
            " acct_1699999999999_deadbeefcafebabe",
            // Unicode digits are not a millisecond timestamp
            "acct_\u{661}\u{666}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}\u{669}_deadbeefcafebabe",
        ] {
            assert!(!is_valid_api_id(raw), "{raw:?} should be rejected");
            assert!(ApiId::parse(raw).is_none());
        }
    }
}
