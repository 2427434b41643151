use std::time::Duration;

/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Upper bound on a single persistence call made from the hub loop.
    /// A gateway slower than this is treated as failed so one stuck call
    /// cannot stall fan-out indefinitely.
    pub store_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables. All values have
    /// defaults suitable for local development.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            store_timeout: Duration::from_millis(
                std::env::var("HUB_STORE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            ),
        }
    }
}
