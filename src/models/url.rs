use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A shortened URL as persisted by the entry store.
///
/// `id` and `original_url` never change once written; `short_code` is the
/// codec's encoding of `id`. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UrlEntry {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: Option<i64>,
    pub is_active: bool,
    pub click_count: i64,
    pub last_accessed_at: Option<i64>,
    pub created_by_ip: Option<String>,
}

/// Whether an entry can currently be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Inactive,
    Expired,
}

impl UrlEntry {
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// Recomputed from the stored fields on every call. A disabled entry
    /// reports `Inactive` even if it has also expired.
    pub fn liveness_at(&self, now: i64) -> Liveness {
        if !self.is_active {
            Liveness::Inactive
        } else if self.is_expired_at(now) {
            Liveness::Expired
        } else {
            Liveness::Live
        }
    }
}

/// Fields supplied by the caller when a new entry is created.
#[derive(Debug, Clone, Default)]
pub struct NewUrlEntry {
    pub original_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub expires_at: Option<i64>,
    pub created_by_ip: Option<String>,
}

/// Stats snapshot: the stored entry plus derived expiry.
#[derive(Debug, Clone, Serialize)]
pub struct UrlStats {
    #[serde(flatten)]
    pub entry: UrlEntry,
    pub is_expired: bool,
}

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub original_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(is_active: bool, expires_at: Option<i64>) -> UrlEntry {
        UrlEntry {
            id: 1,
            short_code: "abcdef".to_string(),
            original_url: "https://example.com".to_string(),
            title: None,
            description: None,
            created_at: 1_000,
            updated_at: 1_000,
            expires_at,
            is_active,
            click_count: 0,
            last_accessed_at: None,
            created_by_ip: None,
        }
    }

    #[test]
    fn test_liveness_without_expiry() {
        assert_eq!(entry(true, None).liveness_at(5_000), Liveness::Live);
        assert_eq!(entry(false, None).liveness_at(5_000), Liveness::Inactive);
    }

    #[test]
    fn test_liveness_with_expiry() {
        let e = entry(true, Some(2_000));
        assert_eq!(e.liveness_at(1_999), Liveness::Live);
        assert_eq!(e.liveness_at(2_000), Liveness::Expired);
        assert_eq!(e.liveness_at(2_001), Liveness::Expired);
    }

    #[test]
    fn test_inactive_takes_precedence_over_expired() {
        assert_eq!(entry(false, Some(10)).liveness_at(50), Liveness::Inactive);
    }

    #[test]
    fn test_stats_serialization_flattens_entry() {
        let stats = UrlStats {
            entry: entry(true, Some(10)),
            is_expired: true,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["short_code"], "abcdef");
        assert_eq!(value["is_expired"], true);
        assert_eq!(value["click_count"], 0);
    }
}
