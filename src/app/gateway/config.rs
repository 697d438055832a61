//! HTTP gateway configuration and client building
//!
//! This module handles the configuration and construction of the HTTP client
//! used to talk to the remote booking service.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::gateway;
use crate::errors::{GatewayError, GatewayResult};

/// Configuration for the remote booking service client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the booking API (a trailing slash is added if missing)
    pub base_url: String,
    /// Whole-request timeout; expiry is a transport or ambiguous failure
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: gateway::DEFAULT_BASE_URL.to_string(),
            request_timeout: gateway::DEFAULT_TIMEOUT,
            connect_timeout: gateway::CONNECT_TIMEOUT,
            rate_limit_rps: gateway::DEFAULT_RATE_LIMIT_RPS,
            user_agent: gateway::USER_AGENT.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create a configuration pointing at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the outgoing rate limit
    pub fn with_rate_limit(mut self, rps: u32) -> Self {
        self.rate_limit_rps = rps;
        self
    }

    /// Parse the base URL, normalising it to end in a slash so joins append
    pub fn parsed_base_url(&self) -> GatewayResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| GatewayError::Config {
            reason: format!("invalid base URL {}: {}", self.base_url, e),
        })
    }

    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> GatewayResult<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(true)
            .build()
            .map_err(|e| GatewayError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })
    }
}
