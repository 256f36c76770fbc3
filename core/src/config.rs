//! Settings an `Account` is constructed with.

use std::time::Duration;

/// Base URL of the hosted v1 API.
pub const DEFAULT_BASE_URL: &str = "https://api.del.icio.us/v1";

/// User agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str = concat!("delicious-core/", env!("CARGO_PKG_VERSION"));

/// Minimum spacing the service asks clients to keep between requests.
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Minimum time between the start of two requests. `Duration::ZERO`
    /// disables pacing.
    pub request_interval: Duration,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
        }
    }
}

impl AccountConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }
}
