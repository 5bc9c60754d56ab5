//! Runtime configuration for the access-control core.
//!
//! Values come from a flat key/value map so the same loader serves the
//! process environment and tests.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::secret::Secret;

pub const JWT_SECRET_KEY: &str = "TRIP_ACCESS_JWT_SECRET";
pub const TOKEN_TTL_KEY: &str = "TRIP_ACCESS_TOKEN_TTL_SECS";
pub const TOKEN_LEEWAY_KEY: &str = "TRIP_ACCESS_TOKEN_LEEWAY_SECS";
pub const SHARE_ENFORCEMENT_KEY: &str = "TRIP_ACCESS_SHARE_ENFORCEMENT";

/// Seven days.
const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Whether recorded share grants take part in admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareEnforcement {
    /// Grants are stored and listed but never admit a non-owner
    #[default]
    RecordOnly,
    /// The gate consults the ledger when the requester is not the owner
    Enforced,
}

/// Settings consumed by the resolver, the token issuer and the gate.
#[derive(Debug)]
pub struct AccessConfig {
    pub jwt_secret: Secret<String>,
    pub token_ttl: Duration,
    /// Clock skew tolerated when checking `exp`
    pub leeway: Duration,
    pub share_enforcement: ShareEnforcement,
}

/// A configuration key was missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{key}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl AccessConfig {
    /// Builds a config with defaults around the given signing key.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: Secret::new(jwt_secret.into()),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            leeway: Duration::ZERO,
            share_enforcement: ShareEnforcement::RecordOnly,
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_share_enforcement(mut self, mode: ShareEnforcement) -> Self {
        self.share_enforcement = mode;
        self
    }

    /// Reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let kv: HashMap<String, String> = std::env::vars().collect();
        Self::from_kv(&kv)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = Secret::new(kv.get(JWT_SECRET_KEY).cloned().unwrap_or_default());
        if jwt_secret.is_blank() {
            return Err(ConfigError {
                key: JWT_SECRET_KEY,
                message: "must be set to a non-empty value".to_string(),
            });
        }

        let token_ttl = parse_secs(kv.get(TOKEN_TTL_KEY), DEFAULT_TOKEN_TTL_SECS, TOKEN_TTL_KEY)?;
        if token_ttl.is_zero() {
            return Err(ConfigError {
                key: TOKEN_TTL_KEY,
                message: "must be >= 1".to_string(),
            });
        }
        let leeway = parse_secs(kv.get(TOKEN_LEEWAY_KEY), 0, TOKEN_LEEWAY_KEY)?;
        let share_enforcement = parse_share_enforcement(kv.get(SHARE_ENFORCEMENT_KEY))?;

        Ok(Self {
            jwt_secret,
            token_ttl,
            leeway,
            share_enforcement,
        })
    }
}

fn parse_secs(
    raw: Option<&String>,
    default: u64,
    key: &'static str,
) -> Result<Duration, ConfigError> {
    match raw.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError {
                key,
                message: format!("expected whole seconds, got '{value}'"),
            }),
    }
}

fn parse_share_enforcement(raw: Option<&String>) -> Result<ShareEnforcement, ConfigError> {
    match raw.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("record_only") => Ok(ShareEnforcement::RecordOnly),
        Some("enforced") => Ok(ShareEnforcement::Enforced),
        Some(other) => Err(ConfigError {
            key: SHARE_ENFORCEMENT_KEY,
            message: format!("expected 'record_only' or 'enforced', got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = AccessConfig::from_kv(&kv(&[(JWT_SECRET_KEY, "k")])).expect("valid");

        assert_eq!(config.token_ttl, Duration::from_secs(604_800));
        assert_eq!(config.leeway, Duration::ZERO);
        assert_eq!(config.share_enforcement, ShareEnforcement::RecordOnly);
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = AccessConfig::from_kv(&kv(&[(TOKEN_TTL_KEY, "60")])).unwrap_err();
        assert_eq!(err.key, JWT_SECRET_KEY);

        let err = AccessConfig::from_kv(&kv(&[(JWT_SECRET_KEY, "  ")])).unwrap_err();
        assert_eq!(err.key, JWT_SECRET_KEY);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AccessConfig::from_kv(&kv(&[
            (JWT_SECRET_KEY, "k"),
            (TOKEN_TTL_KEY, "3600"),
            (TOKEN_LEEWAY_KEY, "5"),
            (SHARE_ENFORCEMENT_KEY, "Enforced"),
        ]))
        .expect("valid");

        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.leeway, Duration::from_secs(5));
        assert_eq!(config.share_enforcement, ShareEnforcement::Enforced);
    }

    #[test]
    fn malformed_values_name_their_key() {
        let err = AccessConfig::from_kv(&kv(&[(JWT_SECRET_KEY, "k"), (TOKEN_TTL_KEY, "7d")]))
            .unwrap_err();
        assert_eq!(err.key, TOKEN_TTL_KEY);

        let err = AccessConfig::from_kv(&kv(&[(JWT_SECRET_KEY, "k"), (TOKEN_TTL_KEY, "0")]))
            .unwrap_err();
        assert_eq!(err.key, TOKEN_TTL_KEY);

        let err = AccessConfig::from_kv(&kv(&[
            (JWT_SECRET_KEY, "k"),
            (SHARE_ENFORCEMENT_KEY, "sometimes"),
        ]))
        .unwrap_err();
        assert_eq!(err.key, SHARE_ENFORCEMENT_KEY);
        assert!(err.to_string().starts_with("TRIP_ACCESS_SHARE_ENFORCEMENT: "));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = AccessConfig::new("do-not-print");
        assert!(!format!("{:?}", config).contains("do-not-print"));
    }
}
