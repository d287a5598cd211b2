//! Client configuration.

use crate::error::{ClientError, ClientResult};
use chatstream_streaming::frame::DEFAULT_MAX_BUFFER_SIZE;
use chatstream_streaming::FrameSeparator;
use reqwest::Client;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default streaming paths, primary first.
pub const DEFAULT_STREAM_PATHS: &[&str] = &["/chat", "/api/chat"];

/// Shape of the JSON body that opens a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestShape {
    /// `{"threadId": .., "content": ..}`: the server loads the history itself.
    #[default]
    Message,
    /// `{"threadId": .., "messages": [..]}`: the client sends the full history.
    History,
}

impl FromStr for RequestShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "message" | "content" => Ok(RequestShape::Message),
            "history" | "messages" => Ok(RequestShape::History),
            other => Err(format!("unknown request shape: {other:?}")),
        }
    }
}

/// Configuration shared by the REST client and the stream controller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL with trailing slashes removed.
    base_url: String,
    /// Per-request timeout for non-streaming calls.
    pub timeout: Option<Duration>,
    /// Connect timeout, applied to streaming calls too.
    pub connect_timeout: Option<Duration>,
    /// Frame separator used by the server.
    pub separator: FrameSeparator,
    /// Candidate streaming paths, tried in order.
    pub stream_paths: Vec<String>,
    /// Body shape for the streaming request.
    pub request_shape: RequestShape,
    /// Largest unterminated frame accepted.
    pub max_frame_size: usize,
}

impl ClientConfig {
    /// Create a config for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `base_url` is not an absolute URL.
    pub fn new(base_url: impl AsRef<str>) -> ClientResult<Self> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| ClientError::configuration(format!("invalid base URL {base_url:?}: {e}")))?;

        Ok(Self {
            base_url,
            timeout: Some(Duration::from_secs(60)),
            connect_timeout: Some(Duration::from_secs(10)),
            separator: FrameSeparator::default(),
            stream_paths: DEFAULT_STREAM_PATHS.iter().map(|p| p.to_string()).collect(),
            request_shape: RequestShape::default(),
            max_frame_size: DEFAULT_MAX_BUFFER_SIZE,
        })
    }

    /// Load from environment variables with given prefix.
    ///
    /// Looks for:
    /// - `{PREFIX}_API_BASE` (required)
    /// - `{PREFIX}_TIMEOUT_SECS`
    /// - `{PREFIX}_FRAME_SEPARATOR` (`blank` or `line`)
    /// - `{PREFIX}_STREAM_PATHS` (comma separated)
    /// - `{PREFIX}_REQUEST_SHAPE` (`message` or `history`)
    pub fn from_env(prefix: &str) -> ClientResult<Self> {
        let var = |name: &str| std::env::var(format!("{prefix}_{name}")).ok();

        let base = var("API_BASE").ok_or_else(|| {
            ClientError::configuration(format!("{prefix}_API_BASE is not set"))
        })?;
        let mut config = Self::new(base)?;

        if let Some(secs) = var("TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ClientError::configuration(format!("{prefix}_TIMEOUT_SECS must be an integer"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(separator) = var("FRAME_SEPARATOR") {
            config.separator = separator.parse().map_err(ClientError::Configuration)?;
        }

        if let Some(paths) = var("STREAM_PATHS") {
            config = config.with_stream_paths(paths.split(','));
        }

        if let Some(shape) = var("REQUEST_SHAPE") {
            config.request_shape = shape.parse().map_err(ClientError::Configuration)?;
        }

        Ok(config)
    }

    /// Set the request timeout for non-streaming calls.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the frame separator.
    #[must_use]
    pub fn with_separator(mut self, separator: FrameSeparator) -> Self {
        self.separator = separator;
        self
    }

    /// Replace the candidate streaming paths.
    ///
    /// Blank entries are skipped; a missing leading `/` is added.
    #[must_use]
    pub fn with_stream_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.stream_paths = paths
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .map(|p| if p.starts_with('/') { p } else { format!("/{p}") })
            .collect();
        self
    }

    /// Set the streaming request body shape.
    #[must_use]
    pub fn with_request_shape(mut self, shape: RequestShape) -> Self {
        self.request_shape = shape;
        self
    }

    /// Set the largest unterminated frame accepted.
    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build an HTTP client with this config.
    ///
    /// Only the connect timeout is set on the client; a whole-request
    /// timeout would cut off long streams.
    pub fn build_client(&self) -> ClientResult<Client> {
        let mut builder = Client::builder();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_url_is_trimmed() {
        let config = ClientConfig::new(" https://api.example.com/// ").unwrap();
        assert_eq!(config.base_url(), "https://api.example.com");
        assert_eq!(config.url("/chat"), "https://api.example.com/chat");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = ClientConfig::new("not a url").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("http://localhost:3000").unwrap();
        assert_eq!(config.stream_paths, vec!["/chat", "/api/chat"]);
        assert_eq!(config.separator, FrameSeparator::Blank);
        assert_eq!(config.request_shape, RequestShape::Message);
    }

    #[test]
    fn test_stream_paths_normalised() {
        let config = ClientConfig::new("http://localhost")
            .unwrap()
            .with_stream_paths(["v2/chat", " ", "/chat "]);
        assert_eq!(config.stream_paths, vec!["/v2/chat", "/chat"]);
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("CS_TEST_ENV_API_BASE", "https://chat.test/");
        std::env::set_var("CS_TEST_ENV_FRAME_SEPARATOR", "line");
        std::env::set_var("CS_TEST_ENV_STREAM_PATHS", "/stream,/legacy/stream");
        std::env::set_var("CS_TEST_ENV_REQUEST_SHAPE", "history");
        std::env::set_var("CS_TEST_ENV_TIMEOUT_SECS", "5");

        let config = ClientConfig::from_env("CS_TEST_ENV").unwrap();

        assert_eq!(config.base_url(), "https://chat.test");
        assert_eq!(config.separator, FrameSeparator::Line);
        assert_eq!(config.stream_paths, vec!["/stream", "/legacy/stream"]);
        assert_eq!(config.request_shape, RequestShape::History);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));

        for name in ["API_BASE", "FRAME_SEPARATOR", "STREAM_PATHS", "REQUEST_SHAPE", "TIMEOUT_SECS"] {
            std::env::remove_var(format!("CS_TEST_ENV_{name}"));
        }
    }

    #[test]
    fn test_config_from_env_requires_base() {
        let err = ClientConfig::from_env("CS_TEST_MISSING").unwrap_err();
        assert!(err.to_string().contains("CS_TEST_MISSING_API_BASE"));
    }

    #[test]
    fn test_build_client() {
        let config = ClientConfig::new("http://localhost").unwrap();
        assert!(config.build_client().is_ok());
    }
}
