// SPDX-License-Identifier: Apache-2.0

//! Console configuration.
//!
//! Holds the backend location and every timing knob the engine uses. The
//! post-commit settle delay and the resolver quiet period are deliberately
//! configuration values rather than constants buried in the flows that use
//! them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConsoleError, ConsoleResult};

/// Path prefix for bot-manager resources (bots, tables, vector stores)
pub const BOTMANAGER_PREFIX: &str = "/api/botmanager";
/// Path prefix for the two-step chat service
pub const TWOSTEPS_PREFIX: &str = "/api/2steps-chat";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Backend origin, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Quiet period before an affected-bot lookup actually fires
    pub resolver_quiet_period_ms: u64,
    /// Settling delay between a committed table update and the dependent
    /// vector-store sync (backend eventual consistency)
    pub settle_delay_ms: u64,
    /// How long terminal submission states stay visible before reverting
    /// to idle
    pub status_display_ms: u64,
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// Delay before the table→columns index is prefetched at startup
    pub index_fetch_delay_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            resolver_quiet_period_ms: 5_000,
            settle_delay_ms: 2_000,
            status_display_ms: 5_000,
            request_timeout_ms: 30_000,
            index_fetch_delay_ms: 5_000,
        }
    }
}

impl ConsoleConfig {
    /// Defaults overridden by `BOTDECK_*` environment variables where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("BOTDECK_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        if let Some(ms) = env_ms("BOTDECK_RESOLVER_QUIET_MS") {
            config.resolver_quiet_period_ms = ms;
        }
        if let Some(ms) = env_ms("BOTDECK_SETTLE_DELAY_MS") {
            config.settle_delay_ms = ms;
        }
        if let Some(ms) = env_ms("BOTDECK_STATUS_DISPLAY_MS") {
            config.status_display_ms = ms;
        }
        if let Some(ms) = env_ms("BOTDECK_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = ms;
        }
        config
    }

    /// Validate and normalize the backend origin (no trailing slash).
    pub fn validated_base_url(&self) -> ConsoleResult<String> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::config(format!("invalid base URL {}: {}", self.base_url, e)))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConsoleError::config(format!(
                    "unsupported base URL scheme: {}",
                    other
                )))
            }
        }
        Ok(self.base_url.trim_end_matches('/').to_string())
    }

    pub fn resolver_quiet_period(&self) -> Duration {
        Duration::from_millis(self.resolver_quiet_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn index_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.index_fetch_delay_ms)
    }
}

fn env_ms(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConsoleConfig::default();
        assert_eq!(config.validated_base_url().unwrap(), "http://localhost:3000");
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.resolver_quiet_period(), Duration::from_secs(5));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ConsoleConfig {
            base_url: "https://console.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validated_base_url().unwrap(),
            "https://console.example.com"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        let config = ConsoleConfig {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validated_base_url().is_err());
    }
}
