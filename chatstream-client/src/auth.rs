//! Authentication session and outbound header policy.
//!
//! [`AuthSession`] holds the bearer token and CSRF token for one logged-in
//! user. It is created at login and cleared at logout; components that
//! need auth headers receive it explicitly through [`HeaderSource`].

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, SET_COOKIE};
use tracing::{debug, warn};

/// Header carrying the CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Cookie names that may carry a CSRF token, in priority order.
pub const CSRF_COOKIE_NAMES: &[&str] = &["csrf", "csrfToken", "XSRF-TOKEN"];

/// Supplies the auth headers attached to outgoing requests.
pub trait HeaderSource: Send + Sync + std::fmt::Debug {
    /// Headers to attach verbatim.
    fn auth_headers(&self) -> HeaderMap;
}

#[derive(Debug, Default, Clone)]
struct Credentials {
    token: Option<String>,
    csrf: Option<String>,
}

/// Credentials for the current user.
#[derive(Debug, Default)]
pub struct AuthSession {
    credentials: RwLock<Credentials>,
}

impl AuthSession {
    /// Create an empty (logged-out) session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a bearer token.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.set_token(Some(token.into()));
        session
    }

    /// Replace the bearer token.
    pub fn set_token(&self, token: Option<String>) {
        self.credentials.write().token = token.filter(|t| !t.is_empty());
    }

    /// Replace the CSRF token.
    pub fn set_csrf(&self, csrf: Option<String>) {
        self.credentials.write().csrf = csrf.filter(|c| !c.is_empty());
    }

    /// Current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.credentials.read().token.clone()
    }

    /// Current CSRF token.
    #[must_use]
    pub fn csrf(&self) -> Option<String> {
        self.credentials.read().csrf.clone()
    }

    /// Whether a bearer token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credentials.read().token.is_some()
    }

    /// Forget all credentials (logout).
    pub fn clear(&self) {
        *self.credentials.write() = Credentials::default();
        debug!("Auth session cleared");
    }

    /// Pick up a CSRF token from `Set-Cookie` response headers.
    ///
    /// Returns `true` when the session was updated.
    pub fn capture_csrf_cookie(&self, headers: &HeaderMap) -> bool {
        match csrf_from_cookies(headers) {
            Some(csrf) => {
                self.set_csrf(Some(csrf));
                true
            }
            None => false,
        }
    }
}

impl HeaderSource for AuthSession {
    fn auth_headers(&self) -> HeaderMap {
        let credentials = self.credentials.read().clone();
        let mut headers = HeaderMap::new();

        if let Some(token) = credentials.token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Bearer token is not a valid header value, omitting"),
            }
        }

        if let Some(csrf) = credentials.csrf {
            match HeaderValue::from_str(&csrf) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(CSRF_HEADER), value);
                }
                Err(_) => warn!("CSRF token is not a valid header value, omitting"),
            }
        }

        headers
    }
}

/// Find the first CSRF cookie among `Set-Cookie` headers.
fn csrf_from_cookies(headers: &HeaderMap) -> Option<String> {
    let cookies: Vec<(&str, &str)> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .collect();

    CSRF_COOKIE_NAMES.iter().find_map(|wanted| {
        cookies
            .iter()
            .find(|(name, value)| name == wanted && !value.is_empty())
            .map(|(_, value)| {
                urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| value.to_string())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_session_has_no_headers() {
        let session = AuthSession::new();
        assert!(session.auth_headers().is_empty());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_headers_from_credentials() {
        let session = AuthSession::with_token("tok");
        session.set_csrf(Some("c1".into()));

        let headers = session.auth_headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
        assert_eq!(headers.get(CSRF_HEADER).unwrap(), "c1");
    }

    #[test]
    fn test_clear_forgets_everything() {
        let session = AuthSession::with_token("tok");
        session.set_csrf(Some("c1".into()));
        session.clear();
        assert!(session.token().is_none());
        assert!(session.csrf().is_none());
    }

    #[test]
    fn test_capture_csrf_cookie_priority() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("XSRF-TOKEN=x; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=abc; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("csrf=a%2Bb; Path=/"));

        let session = AuthSession::new();
        assert!(session.capture_csrf_cookie(&headers));
        assert_eq!(session.csrf().as_deref(), Some("a+b"));
    }

    #[test]
    fn test_capture_without_csrf_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=abc"));

        let session = AuthSession::new();
        assert!(!session.capture_csrf_cookie(&headers));
        assert!(session.csrf().is_none());
    }
}
