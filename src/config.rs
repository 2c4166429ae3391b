use std::time::Duration;

/// Client configuration parsed from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint of the authoritative server.
    pub server_url: String,
    /// Username to register automatically once connected.
    pub username: Option<String>,
    /// Period between keepalive pings while connected.
    pub keepalive_interval: Duration,
    /// First reconnect delay; doubles per failed attempt.
    pub reconnect_initial: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max: Duration,
    /// How long a legal-moves query may stay unanswered.
    pub legal_moves_timeout: Duration,
    /// How long an error banner stays visible.
    pub banner_ttl: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = ClientConfig::default();
        ClientConfig {
            server_url: std::env::var("CHESS_SERVER_URL").unwrap_or(defaults.server_url),
            username: std::env::var("CHESS_USERNAME")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            keepalive_interval: env_secs("CHESS_KEEPALIVE_SECS")
                .unwrap_or(defaults.keepalive_interval),
            reconnect_initial: env_millis("CHESS_RECONNECT_INITIAL_MS")
                .unwrap_or(defaults.reconnect_initial),
            reconnect_max: env_millis("CHESS_RECONNECT_MAX_MS").unwrap_or(defaults.reconnect_max),
            legal_moves_timeout: env_millis("CHESS_LEGAL_MOVES_TIMEOUT_MS")
                .unwrap_or(defaults.legal_moves_timeout),
            banner_ttl: env_millis("CHESS_BANNER_TTL_MS").unwrap_or(defaults.banner_ttl),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_url: "ws://localhost:9988/ws".to_string(),
            username: None,
            keepalive_interval: Duration::from_secs(5),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            legal_moves_timeout: Duration::from_secs(5),
            banner_ttl: Duration::from_secs(4),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n: &u64| n > 0)
        .map(Duration::from_secs)
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n: &u64| n > 0)
        .map(Duration::from_millis)
}
