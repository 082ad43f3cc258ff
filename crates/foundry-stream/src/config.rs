use std::path::Path;
use std::time::Duration;

use crate::errors::FoundryError;

pub(crate) const BASE_URL_ENV: &str = "FOUNDRY_BASE_URL";
pub(crate) const TIMEOUT_ENV: &str = "FOUNDRY_TIMEOUT_SECS";
pub(crate) const TOKEN_ENV: &str = "FOUNDRY_API_TOKEN";

/// Loads `.env` files into the process environment.
///
/// The crate-local file is read first, then the one in the working directory.
/// Missing files are ignored.
pub fn init_env() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Configuration for `FoundryClient`.
#[derive(Clone, Debug)]
pub struct FoundryClientConfig {
    /// Base URL of the backend, without a trailing path.
    pub base_url: String,
    /// Path of the model-comparison evaluation stream.
    pub compare_path: String,
    /// Path of the chat inference stream.
    pub chat_path: String,
    /// Timeout for establishing the connection.
    ///
    /// Streams themselves are unbounded; use an `AbortHandle` to stop them.
    pub connect_timeout: Duration,
    /// Bounded event buffer between the read task and the consumer.
    pub stream_buffer_capacity: usize,
}

impl FoundryClientConfig {
    /// Creates a config with default paths for the given backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            compare_path: "/evaluation/compare".to_string(),
            chat_path: "/chat/inference".to_string(),
            connect_timeout: Duration::from_secs(30),
            stream_buffer_capacity: 128,
        }
    }

    /// Builds a config from `FOUNDRY_BASE_URL` and `FOUNDRY_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, FoundryError> {
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(FoundryError::Config(format!("missing {BASE_URL_ENV}")));
        }
        let mut config = Self::new(base_url.trim());
        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                FoundryError::Config(format!("{TIMEOUT_ENV} must be whole seconds, got {raw:?}"))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Overrides the comparison stream path.
    pub fn compare_path(mut self, path: impl Into<String>) -> Self {
        self.compare_path = path.into();
        self
    }

    /// Overrides the chat stream path.
    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the stream buffer size.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), FoundryError> {
        if self.base_url.trim().is_empty() {
            return Err(FoundryError::Config("base_url must not be empty".into()));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(FoundryError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn compare_url(&self) -> String {
        join_url(&self.base_url, &self.compare_path)
    }

    pub(crate) fn chat_url(&self) -> String {
        join_url(&self.base_url, &self.chat_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_doubled_slashes() {
        let config = FoundryClientConfig::new("http://localhost:8000/").chat_path("chat/stream");
        assert_eq!(config.chat_url(), "http://localhost:8000/chat/stream");
        assert_eq!(
            config.compare_url(),
            "http://localhost:8000/evaluation/compare"
        );
    }

    #[test]
    fn validate_rejects_zero_buffer_and_blank_base() {
        assert!(matches!(
            FoundryClientConfig::new("http://x").stream_buffer_capacity(0).validate(),
            Err(FoundryError::Config(msg)) if msg.contains("stream_buffer_capacity")
        ));
        assert!(FoundryClientConfig::new("  ").validate().is_err());
        assert!(FoundryClientConfig::new("http://x").validate().is_ok());
    }
}
