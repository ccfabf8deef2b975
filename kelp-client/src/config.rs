//! Client configuration

use std::time::Duration;

/// Configuration for one kitchen board client
///
/// One instance per mounted board. The supervisor, channel and engine
/// are all constructed from it; there is no module-level state.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Restaurant scope for every fetch, event filter and presence record
    pub restaurant_id: String,

    /// Client name reported in the feed handshake and presence record
    pub client_name: String,

    /// Page identifier for the presence record
    pub page: String,

    /// Store base URL (e.g. "http://localhost:8080")
    pub base_url: String,

    /// Bearer token for store calls
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Change feed TCP address (for `TcpConnector`)
    pub feed_addr: Option<String>,

    /// Delay between reconnect attempts
    pub retry_interval: Duration,

    /// Reconnect attempts before giving up until a manual reconnect
    pub max_retry_attempts: u32,

    /// Presence heartbeat interval while connected
    pub heartbeat_interval: Duration,

    /// Snapshot age beyond which reads should trigger a refresh
    pub snapshot_max_age: Duration,

    /// Capacity of the event fan-out channel
    pub channel_capacity: usize,
}

impl BoardConfig {
    /// Create a configuration with defaults
    pub fn new(restaurant_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            client_name: "kelp-client".to_string(),
            page: "kitchen-board".to_string(),
            base_url: base_url.into(),
            token: None,
            timeout: 30,
            feed_addr: None,
            retry_interval: Duration::from_secs(5),
            max_retry_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
            snapshot_max_age: Duration::from_secs(300),
            channel_capacity: 1024,
        }
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the change feed TCP address
    pub fn with_feed_addr(mut self, addr: impl Into<String>) -> Self {
        self.feed_addr = Some(addr.into());
        self
    }

    /// Set the reconnect policy
    pub fn with_retry(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.retry_interval = interval;
        self.max_retry_attempts = max_attempts;
        self
    }

    /// Set the presence heartbeat interval
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the client name reported to the feed
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }
}
