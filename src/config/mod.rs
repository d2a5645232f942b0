use anyhow::{bail, Context};
use axum::http::StatusCode;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::codec::MAX_MIN_LENGTH;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    /// Prefix used to compose full short URLs, e.g. `https://sh.rt`
    pub base_domain: String,
    pub codec: CodecConfig,
    pub client_ip: ClientIpConfig,
    pub pagination: PaginationConfig,
    pub redirect_status: RedirectMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    pub salt: String,
    pub min_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    None,
    Standard,
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Proxies whose X-Forwarded-For hops are skipped in standard mode
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    /// Fixed number of trusted hops; takes precedence over `trusted_proxies`
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Cursor signing key. When unset a random key is generated and cursors
    /// do not survive a restart.
    pub cursor_hmac_secret: Option<String>,
}

/// HTTP status used when redirecting to the original URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectMode {
    #[serde(rename = "301")]
    MovedPermanently,
    #[default]
    #[serde(rename = "302")]
    Found,
    #[serde(rename = "307")]
    TemporaryRedirect,
    #[serde(rename = "308")]
    PermanentRedirect,
}

impl RedirectMode {
    pub fn status_code(self) -> StatusCode {
        match self {
            RedirectMode::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
            RedirectMode::Found => StatusCode::FOUND,
            RedirectMode::TemporaryRedirect => StatusCode::TEMPORARY_REDIRECT,
            RedirectMode::PermanentRedirect => StatusCode::PERMANENT_REDIRECT,
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim() {
            "301" => Ok(RedirectMode::MovedPermanently),
            "302" => Ok(RedirectMode::Found),
            "307" => Ok(RedirectMode::TemporaryRedirect),
            "308" => Ok(RedirectMode::PermanentRedirect),
            other => bail!("REDIRECT_STATUS must be one of 301, 302, 307, 308, got '{other}'"),
        }
    }
}

impl CodecConfig {
    const fn default_min_length() -> usize {
        6
    }
}

/// Parse a comma-separated list of CIDRs; bare addresses become host routes.
pub fn parse_trusted_proxies(value: &str) -> anyhow::Result<Vec<IpNet>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| -> anyhow::Result<IpNet> {
            if let Ok(net) = s.parse::<IpNet>() {
                return Ok(net);
            }
            let addr = s
                .parse::<std::net::IpAddr>()
                .with_context(|| format!("invalid entry '{s}' in TRUSTED_PROXIES"))?;
            let prefix = if addr.is_ipv4() { 32 } else { 128 };
            Ok(IpNet::new(addr, prefix)?)
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./shrt.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(5);

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port")?;

        let redirect_host =
            std::env::var("REDIRECT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let redirect_port = std::env::var("REDIRECT_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("REDIRECT_PORT must be a valid port")?;

        let base_domain = std::env::var("BASE_DOMAIN")
            .unwrap_or_else(|_| format!("http://localhost:{redirect_port}"));

        let salt = std::env::var("CODEC_SALT").context("CODEC_SALT must be set")?;
        let min_length = std::env::var("CODEC_MIN_LENGTH")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("CODEC_MIN_LENGTH must be a positive integer")?
            .unwrap_or_else(CodecConfig::default_min_length);

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = match std::env::var("TRUSTED_PROXIES") {
            Ok(value) => parse_trusted_proxies(&value)?,
            Err(_) => Vec::new(),
        };

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        let cursor_hmac_secret = std::env::var("CURSOR_HMAC_SECRET").ok();

        let redirect_status = match std::env::var("REDIRECT_STATUS") {
            Ok(value) => RedirectMode::parse(&value)?,
            Err(_) => RedirectMode::default(),
        };

        let config = Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            base_domain,
            codec: CodecConfig { salt, min_length },
            client_ip: ClientIpConfig {
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
            pagination: PaginationConfig { cursor_hmac_secret },
            redirect_status,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        if self.codec.salt.is_empty() {
            bail!("CODEC_SALT must not be empty");
        }

        if self.codec.min_length == 0 || self.codec.min_length > MAX_MIN_LENGTH {
            bail!(
                "CODEC_MIN_LENGTH must be between 1 and {MAX_MIN_LENGTH}, got {}",
                self.codec.min_length
            );
        }

        let base = url::Url::parse(&self.base_domain)
            .with_context(|| format!("BASE_DOMAIN '{}' is not a valid URL", self.base_domain))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            bail!(
                "BASE_DOMAIN must be an http(s) URL with a host, got '{}'",
                self.base_domain
            );
        }

        Ok(())
    }

    /// Full public URL for a short code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_domain.trim_end_matches('/'), short_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database: DatabaseConfig {
                backend: DatabaseBackend::Sqlite,
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            api_server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            redirect_server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            base_domain: "https://sh.rt/".to_string(),
            codec: CodecConfig {
                salt: "salt".to_string(),
                min_length: 6,
            },
            client_ip: ClientIpConfig::default(),
            pagination: PaginationConfig::default(),
            redirect_status: RedirectMode::default(),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = config();
        c.codec.salt.clear();
        assert!(c.validate().is_err());

        let mut c = config();
        c.codec.min_length = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.codec.min_length = MAX_MIN_LENGTH + 1;
        assert!(c.validate().is_err());

        let mut c = config();
        c.base_domain = "sh.rt".to_string();
        assert!(c.validate().is_err());

        let mut c = config();
        c.base_domain = "ftp://sh.rt".to_string();
        assert!(c.validate().is_err());

        let mut c = config();
        c.database.max_connections = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_short_url_trims_trailing_slash() {
        assert_eq!(config().short_url("aB3dE9"), "https://sh.rt/aB3dE9");
    }

    #[test]
    fn test_redirect_mode_parse() {
        assert_eq!(RedirectMode::parse("302").unwrap(), RedirectMode::Found);
        assert_eq!(
            RedirectMode::parse(" 308 ").unwrap().status_code(),
            StatusCode::PERMANENT_REDIRECT
        );
        assert!(RedirectMode::parse("200").is_err());
        assert_eq!(RedirectMode::default().status_code(), StatusCode::FOUND);
    }

    #[test]
    fn test_parse_trusted_proxies() {
        let nets = parse_trusted_proxies("10.0.0.0/8, 192.168.1.1 ,,2001:db8::/32").unwrap();
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[1], "192.168.1.1/32".parse::<IpNet>().unwrap());
        assert!(parse_trusted_proxies("10.0.0.0/8,not-an-ip").is_err());
    }
}
