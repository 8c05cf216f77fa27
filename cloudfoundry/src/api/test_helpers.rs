//! Test helpers for the Cloud Foundry API

use super::client::{Client, ClientConfig};
use std::time::Duration;

/// Client against a mock server with fast job polling
pub fn create_test_client(url: &str) -> Client {
    Client::with_config(url, "test-token", test_client_config()).unwrap()
}

pub fn test_client_config() -> ClientConfig {
    ClientConfig {
        request_timeout: Duration::from_secs(5),
        job_poll_interval: Duration::from_millis(10),
        job_timeout: Duration::from_secs(2),
        skip_ssl_validation: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout.as_secs(), 60);
        assert_eq!(config.job_poll_interval.as_secs(), 2);
        assert_eq!(config.job_timeout.as_secs(), 1200);
        assert!(!config.skip_ssl_validation);
    }

    #[test]
    fn test_client_uses_fast_polling() {
        let client = create_test_client("http://127.0.0.1:9");
        assert_eq!(client.config().job_poll_interval, Duration::from_millis(10));
    }
}
