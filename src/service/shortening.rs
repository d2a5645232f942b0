use std::sync::Arc;

use tracing::{debug, error, info};
use url::Url;

use super::{unix_now, ServiceError, ServiceResult};
use crate::codec::CodeCodec;
use crate::models::{NewUrlEntry, UrlEntry};
use crate::storage::{Storage, StorageError};

/// Longest URL accepted for shortening.
pub const MAX_URL_LENGTH: usize = 2048;

pub struct ShorteningService {
    storage: Arc<dyn Storage>,
    codec: Arc<CodeCodec>,
}

impl ShorteningService {
    pub fn new(storage: Arc<dyn Storage>, codec: Arc<CodeCodec>) -> Self {
        Self { storage, codec }
    }

    /// Shorten `entry.original_url`.
    ///
    /// If an active, unexpired entry already exists for exactly the same URL
    /// string it is returned unchanged and no id is consumed. Otherwise a new
    /// entry is created. The flag is `true` only for newly created entries.
    ///
    /// An `expires_at` already in the past is stored as given; such an entry
    /// is simply never resolvable.
    pub async fn shorten(&self, entry: NewUrlEntry) -> ServiceResult<(UrlEntry, bool)> {
        validate_url(&entry.original_url)?;

        let now = unix_now();

        if let Some(existing) = self
            .storage
            .find_by_original_url(&entry.original_url, now)
            .await?
        {
            debug!(short_code = %existing.short_code, "reusing existing entry");
            return Ok((existing, false));
        }

        let created = match self.storage.create(&entry, &self.codec, now).await {
            Ok(created) => created,
            Err(StorageError::Conflict) => {
                error!(
                    original_url = %entry.original_url,
                    "derived short code already exists; id sequence or codec salt is inconsistent"
                );
                return Err(ServiceError::Internal(anyhow::anyhow!(
                    "short code uniqueness violated"
                )));
            }
            Err(StorageError::Other(e)) => return Err(ServiceError::Internal(e)),
        };

        info!(id = created.id, short_code = %created.short_code, "created short URL");
        Ok((created, true))
    }
}

/// Absolute http(s) URL with a host, at most [`MAX_URL_LENGTH`] bytes.
///
/// The string is stored verbatim and later sent as a `Location` header, so
/// whitespace and control characters are rejected rather than left for
/// [`Url::parse`] to strip.
pub fn validate_url(input: &str) -> ServiceResult<()> {
    if input.len() > MAX_URL_LENGTH {
        return Err(ServiceError::InvalidUrl(format!(
            "URL is too long, maximum length is {MAX_URL_LENGTH} characters"
        )));
    }

    if input.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ServiceError::InvalidUrl(
            "URL must not contain whitespace or control characters".to_string(),
        ));
    }

    let url = Url::parse(input).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServiceError::InvalidUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ServiceError::InvalidUrl("URL must include a host".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_absolute_http_urls() {
        for url in [
            "https://example.com/a/b",
            "http://example.com",
            "https://sub.example.co.uk:8443/path?q=1&r=2#frag",
            "http://127.0.0.1:8080/",
            "https://[2001:db8::1]/x",
        ] {
            assert!(validate_url(url).is_ok(), "{url} should be valid");
        }
    }

    #[test]
    fn test_validate_url_rejects_malformed() {
        for url in [
            "",
            "not a url",
            "example.com/path",
            "/relative/path",
            "ftp://example.com/file",
            "javascript:alert(1)",
            "mailto:someone@example.com",
            "https://",
            "http://",
            "https://example.com/a\nb",
            "https://example.com/a\tb",
            "https://example.com/a\rb",
            "https://example.com/a\u{7f}b",
            "https://example.com/a\u{0}b",
            "https://example.com/a b",
            " https://example.com/",
            "https://example.com/\u{a0}",
        ] {
            assert!(
                matches!(validate_url(url), Err(ServiceError::InvalidUrl(_))),
                "{url:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_url_length_limit() {
        let ok = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH - 20));
        assert_eq!(ok.len(), MAX_URL_LENGTH);
        assert!(validate_url(&ok).is_ok());

        let too_long = format!("{ok}a");
        assert!(matches!(
            validate_url(&too_long),
            Err(ServiceError::InvalidUrl(_))
        ));
    }
}
