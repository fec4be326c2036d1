//! Server configuration.

use std::net::SocketAddr;

/// Environment variable holding the backfill window.
pub const MAX_ALLOWED_LOOKBACK_ENV: &str = "SUBSCRIBE_LABELS_CURSOR_MAX_ALLOWED_LOOKBACK";

/// Configuration for the label subscription server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// How far behind the tail a resuming cursor may start.
    pub max_allowed_lookback: u64,
    /// Entries fetched from the log per read.
    pub read_batch: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_allowed_lookback: 0,
            read_batch: 100,
        }
    }

    /// Sets the backfill window.
    pub fn with_max_allowed_lookback(mut self, lookback: u64) -> Self {
        self.max_allowed_lookback = lookback;
        self
    }

    /// Sets the read batch size (at least 1).
    pub fn with_read_batch(mut self, size: usize) -> Self {
        self.read_batch = size.max(1);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 5001)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_allowed_lookback, 0);
        assert_eq!(config.bind_addr.port(), 5001);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_allowed_lookback(200)
            .with_read_batch(0);

        assert_eq!(config.max_allowed_lookback, 200);
        assert_eq!(config.read_batch, 1);
    }
}
