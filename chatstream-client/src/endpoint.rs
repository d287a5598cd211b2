//! Ordered endpoint candidates.
//!
//! Servers expose the same route under more than one path (a primary and a
//! legacy alias). [`EndpointCandidates`] tries them in order: the first
//! success wins, a not-found advances to the next path, and any other
//! failure stops the whole list.
//!
//! # Example
//!
//! ```rust,ignore
//! let candidates = EndpointCandidates::new(["/chat", "/api/chat"]);
//! let response = candidates
//!     .try_in_order(|path| async move { connect(&path).await })
//!     .await?;
//! ```

use crate::error::{ClientError, ClientResult};
use std::future::Future;
use tracing::{debug, warn};

/// An ordered list of alternative paths for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidates {
    paths: Vec<String>,
}

impl EndpointCandidates {
    /// Create a candidate list, primary path first.
    #[must_use]
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// A path under its primary and `/api`-prefixed alias.
    #[must_use]
    pub fn with_api_alias(path: &str) -> Self {
        Self::new([path.to_string(), format!("/api{path}")])
    }

    /// Append a suffix to every candidate.
    #[must_use]
    pub fn join(&self, suffix: &str) -> Self {
        Self::new(self.paths.iter().map(|p| format!("{p}{suffix}")))
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate the candidates in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Run `attempt` against each candidate in order.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not a not-found. If every candidate
    /// returns not-found, returns [`ClientError::EndpointsExhausted`]
    /// carrying the last one.
    pub async fn try_in_order<T, F, Fut>(&self, mut attempt: F) -> ClientResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        if self.paths.is_empty() {
            return Err(ClientError::configuration("No endpoint candidates configured"));
        }

        let mut last_error: Option<ClientError> = None;

        for (i, path) in self.paths.iter().enumerate() {
            debug!(
                endpoint = %path,
                attempt = i + 1,
                total = self.paths.len(),
                "Trying endpoint candidate"
            );

            match attempt(path.clone()).await {
                Ok(value) => {
                    if i > 0 {
                        debug!(endpoint = %path, attempt = i + 1, "Fallback endpoint succeeded");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_not_found() => {
                    debug!(endpoint = %path, "Endpoint not found, advancing");
                    last_error = Some(error);
                }
                Err(error) => {
                    warn!(endpoint = %path, error = %error, "Endpoint failed, not retrying");
                    return Err(error);
                }
            }
        }

        let last = last_error.unwrap_or_else(|| ClientError::NotFound {
            path: self.paths.last().cloned().unwrap_or_default(),
        });
        Err(ClientError::EndpointsExhausted {
            tried: self.paths.clone(),
            last: Box::new(last),
        })
    }
}
