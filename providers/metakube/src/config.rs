//! Provider configuration
//!
//! Explicit values win over the environment. The token may be given inline,
//! through `METAKUBE_TOKEN`, or as a file path (`token_path` or
//! `METAKUBE_TOKEN_PATH`).

use crate::error::ProviderError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// API endpoint used when neither the block nor the environment names one
pub const DEFAULT_HOST: &str = "https://metakube.syseleven.de";
/// Environment fallback for `host`
pub const ENV_HOST: &str = "METAKUBE_HOST";
/// Environment fallback for `token`
pub const ENV_TOKEN: &str = "METAKUBE_TOKEN";
/// Environment fallback for `token_path`
pub const ENV_TOKEN_PATH: &str = "METAKUBE_TOKEN_PATH";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Deadlines of the waiting lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Create and wait for readiness
    #[serde(with = "duration_str")]
    pub create: Duration,
    /// Patch and wait for readiness
    #[serde(with = "duration_str")]
    pub update: Duration,
    /// Delete and wait until gone
    #[serde(with = "duration_str")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

/// Provider block as declared by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API endpoint, e.g. `https://metakube.syseleven.de`
    pub host: Option<String>,
    /// Bearer token
    pub token: Option<String>,
    /// File holding the bearer token
    pub token_path: Option<PathBuf>,
    /// Operation deadlines, written as `20m` or `1h30m`
    pub timeouts: Timeouts,
}

/// Configuration with every fallback applied
#[derive(Clone)]
pub struct ResolvedConfig {
    /// API endpoint without a trailing slash
    pub host: String,
    /// Bearer token
    pub token: String,
    /// Operation deadlines
    pub timeouts: Timeouts,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve against the process environment
    pub fn resolve_from_env(&self) -> Result<ResolvedConfig, ProviderError> {
        self.resolve(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment variables
    pub fn resolve<F>(&self, lookup: F) -> Result<ResolvedConfig, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = self
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| env(ENV_HOST))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let token = match self.token.clone().filter(|t| !t.trim().is_empty()) {
            Some(token) => token,
            None => match env(ENV_TOKEN) {
                Some(token) => token,
                None => {
                    let path = self.token_path.clone().or_else(|| env(ENV_TOKEN_PATH).map(PathBuf::from));
                    match path {
                        Some(path) => read_token(&path)?,
                        None => {
                            return Err(ProviderError::InvalidConfig(format!(
                                "no API token: set token, token_path, {} or {}",
                                ENV_TOKEN, ENV_TOKEN_PATH
                            )));
                        }
                    }
                }
            },
        };

        Ok(ResolvedConfig {
            host: host.trim_end_matches('/').to_string(),
            token,
            timeouts: self.timeouts,
        })
    }
}

fn read_token(path: &std::path::Path) -> Result<String, ProviderError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ProviderError::InvalidConfig(format!("cannot read token file {}: {}", path.display(), e))
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(ProviderError::InvalidConfig(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token.to_string())
}

/// Parse durations written as `90s`, `20m`, `1h30m` or plain seconds
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| format!("invalid duration {:?}: {}", raw, e))
}

/// Render a duration the way `parse_duration` reads it
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
