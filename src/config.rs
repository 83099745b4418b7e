// MCP Service Configuration
use crate::bitbucket::{Credentials, Dialect};
use crate::diff::ConfidenceWeights;
use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Clone)]
pub struct McpConfig {
    pub username: String,
    /// Token selects Server, app password selects Cloud
    pub credentials: Credentials,
    pub base_url: String,

    // Timeouts
    pub request_timeout_secs: u64,

    /// `/health` listener; disabled when unset
    pub health_port: Option<u16>,

    // Snippet matching
    pub confidence_weights: ConfidenceWeights,
}

impl McpConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let username = var("BITBUCKET_USERNAME").context("BITBUCKET_USERNAME is required")?;

        let credentials = match (var("BITBUCKET_TOKEN"), var("BITBUCKET_APP_PASSWORD")) {
            (Some(token), _) => Credentials::Bearer { token },
            (None, Some(password)) => Credentials::Basic {
                username: username.clone(),
                password,
            },
            (None, None) => bail!(
                "Either BITBUCKET_APP_PASSWORD (for Cloud) or BITBUCKET_TOKEN (for Server) is required"
            ),
        };

        let defaults = ConfidenceWeights::default();

        Ok(Self {
            base_url: var("BITBUCKET_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: parse_or(&var, "REQUEST_TIMEOUT_SECS", 30)?,
            health_port: var("MCP_HEALTH_PORT")
                .map(|raw| {
                    raw.trim()
                        .parse::<u16>()
                        .with_context(|| format!("MCP_HEALTH_PORT must be a port number, got {raw:?}"))
                })
                .transpose()?,
            confidence_weights: ConfidenceWeights {
                base: parse_or(&var, "MATCH_BASE_CONFIDENCE", defaults.base)?,
                context_weight: parse_or(&var, "MATCH_CONTEXT_WEIGHT", defaults.context_weight)?,
                added_bonus: parse_or(&var, "MATCH_ADDED_BONUS", defaults.added_bonus)?,
                max: defaults.max,
            },
            username,
            credentials,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.credentials.dialect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<McpConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        McpConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn cloud_defaults() {
        let config = config(&[
            ("BITBUCKET_USERNAME", "me"),
            ("BITBUCKET_APP_PASSWORD", "pw"),
        ])
        .unwrap();

        assert_eq!(config.dialect(), Dialect::Cloud);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.health_port, None);
        assert_eq!(config.confidence_weights.base, 0.5);
    }

    #[test]
    fn token_wins_over_password() {
        let config = config(&[
            ("BITBUCKET_USERNAME", "me"),
            ("BITBUCKET_APP_PASSWORD", "pw"),
            ("BITBUCKET_TOKEN", "tok"),
            ("BITBUCKET_BASE_URL", "https://git.example.com"),
            ("MCP_HEALTH_PORT", "8081"),
            ("MATCH_CONTEXT_WEIGHT", "0.2"),
        ])
        .unwrap();

        assert_eq!(config.dialect(), Dialect::Server);
        assert_eq!(config.base_url, "https://git.example.com");
        assert_eq!(config.health_port, Some(8081));
        assert_eq!(config.confidence_weights.context_weight, 0.2);
    }

    #[test]
    fn missing_credentials_fail() {
        let err = config(&[("BITBUCKET_USERNAME", "me"), ("BITBUCKET_TOKEN", "  ")]).unwrap_err();
        assert!(err.to_string().contains("BITBUCKET_APP_PASSWORD"));

        let err = config(&[("BITBUCKET_TOKEN", "tok")]).unwrap_err();
        assert!(err.to_string().contains("BITBUCKET_USERNAME"));
    }

    #[test]
    fn bad_numbers_fail() {
        let err = config(&[
            ("BITBUCKET_USERNAME", "me"),
            ("BITBUCKET_TOKEN", "tok"),
            ("REQUEST_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));
    }
}
