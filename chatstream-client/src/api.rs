//! REST client for auth, threads and messages.
//!
//! Every route is tried under its primary path and the `/api` alias, using
//! the same not-found fallback as the streaming controller.

use crate::auth::{AuthSession, HeaderSource};
use crate::config::ClientConfig;
use crate::endpoint::EndpointCandidates;
use crate::error::{ClientError, ClientResult};
use chatstream_core::{Message, Role, Thread, ThreadId, DEFAULT_THREAD_TITLE};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Path of the title generation helper.
pub const GENERATE_TITLE_PATH: &str = "/api/utils/generate-title";

/// Body returned by login and signup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token (`token` or `access` on the wire).
    #[serde(default, alias = "access")]
    pub token: Option<String>,
    /// CSRF token, when the server returns it in the body.
    #[serde(default)]
    pub csrf: Option<String>,
    /// User profile, passed through untouched.
    #[serde(default)]
    pub user: Option<Value>,
}

/// List bodies come either wrapped in `rows` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Rows<T> {
    Wrapped { rows: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Rows<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Rows::Wrapped { rows } | Rows::Bare(rows) => rows,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedThread {
    #[serde(default, alias = "_id")]
    id: Option<Value>,
    #[serde(default)]
    row: Option<Thread>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TitleResponse {
    Object { title: String },
    Bare(String),
}

/// HTTP client for the non-streaming endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<ClientConfig>,
    session: Arc<AuthSession>,
}

impl ApiClient {
    /// Create a client sharing `session` with other components.
    pub fn new(config: ClientConfig, session: Arc<AuthSession>) -> ClientResult<Self> {
        let http = config.build_client()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            session,
        })
    }

    /// Create a client with an existing reqwest client.
    pub fn with_http_client(http: Client, config: ClientConfig, session: Arc<AuthSession>) -> Self {
        Self {
            http,
            config: Arc::new(config),
            session,
        }
    }

    /// The auth session this client reads and updates.
    #[must_use]
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    /// Log in and store the returned credentials in the session.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let candidates = EndpointCandidates::new(["/auth/login", "/login"]);
        self.authenticate(&candidates, email, password).await
    }

    /// Create an account and store the returned credentials in the session.
    pub async fn signup(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let candidates = EndpointCandidates::new(["/auth/signup", "/signup"]);
        self.authenticate(&candidates, email, password).await
    }

    async fn authenticate(
        &self,
        candidates: &EndpointCandidates,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthResponse> {
        let body = json!({ "email": email, "password": password });
        let response: AuthResponse = self
            .request_json(Method::POST, candidates, &[], Some(&body))
            .await?;

        if response.token.is_some() {
            self.session.set_token(response.token.clone());
        }
        // A cookie captured during the request wins over the body.
        if self.session.csrf().is_none() && response.csrf.is_some() {
            self.session.set_csrf(response.csrf.clone());
        }

        debug!(authenticated = self.session.is_authenticated(), "Auth request completed");
        Ok(response)
    }

    /// Log out. The server call is best-effort; the session is always cleared.
    pub async fn logout(&self) {
        let candidates = EndpointCandidates::new(["/auth/logout"]);
        if let Err(error) = self
            .request_json::<Value>(Method::POST, &candidates, &[], None)
            .await
        {
            warn!(error = %error, "Logout request failed, clearing session anyway");
        }
        self.session.clear();
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    /// List the user's threads.
    pub async fn list_threads(&self) -> ClientResult<Vec<Thread>> {
        let rows: Rows<Thread> = self
            .request_json(Method::GET, &threads(), &[], None)
            .await?;
        Ok(rows.into_vec())
    }

    /// Create a thread, defaulting the title to [`DEFAULT_THREAD_TITLE`].
    pub async fn create_thread(&self, title: Option<&str>) -> ClientResult<Thread> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_THREAD_TITLE);

        let created: CreatedThread = self
            .request_json(Method::POST, &threads(), &[], Some(&json!({ "title": title })))
            .await?;

        if let Some(row) = created.row {
            return Ok(row);
        }

        let id = match created.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ClientError::Other(anyhow::anyhow!(
                    "create thread response carried no id"
                )))
            }
        };
        Ok(Thread::new(id, title))
    }

    /// Rename a thread.
    pub async fn rename_thread(&self, id: &ThreadId, title: &str) -> ClientResult<()> {
        let candidates = threads().join(&thread_segment(id));
        self.request_json::<Value>(Method::PATCH, &candidates, &[], Some(&json!({ "title": title })))
            .await?;
        Ok(())
    }

    /// Delete a thread.
    pub async fn delete_thread(&self, id: &ThreadId) -> ClientResult<()> {
        let candidates = threads().join(&thread_segment(id));
        self.request_json::<Value>(Method::DELETE, &candidates, &[], None)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// List a thread's messages in conversational order.
    pub async fn list_messages(&self, thread_id: &ThreadId) -> ClientResult<Vec<Message>> {
        let rows: Rows<Message> = self
            .request_json(
                Method::GET,
                &messages(),
                &[("threadId", thread_id.as_str())],
                None,
            )
            .await?;
        Ok(rows.into_vec())
    }

    /// Persist one message.
    pub async fn post_message(
        &self,
        thread_id: &ThreadId,
        role: Role,
        content: &str,
    ) -> ClientResult<()> {
        let body = json!({ "threadId": thread_id, "role": role, "content": content });
        self.request_json::<Value>(Method::POST, &messages(), &[], Some(&body))
            .await?;
        Ok(())
    }

    /// Ask the server for a short title summarising `sample`.
    pub async fn generate_title(&self, sample: &str) -> ClientResult<String> {
        let candidates = EndpointCandidates::new([GENERATE_TITLE_PATH]);
        let response: TitleResponse = self
            .request_json(Method::POST, &candidates, &[], Some(&json!({ "text": sample })))
            .await?;
        let title = match response {
            TitleResponse::Object { title } | TitleResponse::Bare(title) => title,
        };
        Ok(title.trim().to_string())
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        candidates: &EndpointCandidates,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ClientResult<T> {
        let value = candidates
            .try_in_order(|path| self.request_once(method.clone(), path, query, body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn request_once(
        &self,
        method: Method,
        path: String,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let mut request = self
            .http
            .request(method, self.config.url(&path))
            .header(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"))
            .headers(self.session.auth_headers());

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::from_status(status.as_u16(), &text, &path));
        }

        self.session.capture_csrf_cookie(&headers);
        Ok(read_body(&text))
    }
}

/// Parse a body as JSON, falling back to a string (or null when empty).
fn read_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn threads() -> EndpointCandidates {
    EndpointCandidates::with_api_alias("/threads")
}

fn messages() -> EndpointCandidates {
    EndpointCandidates::with_api_alias("/messages")
}

fn thread_segment(id: &ThreadId) -> String {
    format!("/{}", urlencoding::encode(id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CSRF_HEADER;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        let config = ClientConfig::new(server.uri()).unwrap();
        ApiClient::new(config, Arc::new(AuthSession::new())).unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_token_and_csrf_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "a@b.c", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "csrf=cookie-token; Path=/")
                    .set_body_json(json!({"ok": true, "token": "jwt", "csrf": "body-token"})),
            )
            .mount(&server)
            .await;

        let api = client(&server);
        let response = api.login("a@b.c", "pw").await.unwrap();

        assert_eq!(response.token.as_deref(), Some("jwt"));
        assert_eq!(api.session().token().as_deref(), Some("jwt"));
        assert_eq!(api.session().csrf().as_deref(), Some("cookie-token"));
    }

    #[tokio::test]
    async fn test_login_falls_back_to_legacy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "jwt2"})))
            .mount(&server)
            .await;

        let api = client(&server);
        api.login("a@b.c", "pw").await.unwrap();
        assert_eq!(api.session().token().as_deref(), Some("jwt2"));
    }

    #[tokio::test]
    async fn test_bad_credentials_surface_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad password"})))
            .mount(&server)
            .await;

        let err = client(&server).login("a@b.c", "nope").await.unwrap_err();
        match err {
            ClientError::Authentication { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad password");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_logout_clears_session_even_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = client(&server);
        api.session().set_token(Some("jwt".into()));
        api.logout().await;
        assert!(!api.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_list_threads_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads"))
            .and(header("authorization", "Bearer jwt"))
            .and(header(CSRF_HEADER, "c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "rows": [{"_id": "t1", "title": "First"}, {"id": "t2", "title": ""}]
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        api.session().set_token(Some("jwt".into()));
        api.session().set_csrf(Some("c1".into()));

        let threads = api.list_threads().await.unwrap();
        assert_eq!(
            threads,
            vec![Thread::new("t1", "First"), Thread::new("t2", "")]
        );
    }

    #[tokio::test]
    async fn test_create_thread_uses_default_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(body_json(json!({"title": DEFAULT_THREAD_TITLE})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "id": "t9"})))
            .mount(&server)
            .await;

        let thread = client(&server).create_thread(None).await.unwrap();
        assert_eq!(thread, Thread::new("t9", DEFAULT_THREAD_TITLE));
    }

    #[tokio::test]
    async fn test_rename_thread_encodes_id_and_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/threads/a%20b"))
            .and(body_json(json!({"title": "Renamed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .rename_thread(&ThreadId::from("a b"), "Renamed")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_messages_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("threadId", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            })))
            .mount(&server)
            .await;

        let messages = client(&server)
            .list_messages(&ThreadId::from("t1"))
            .await
            .unwrap();
        assert_eq!(messages, vec![Message::user("hi"), Message::assistant("hello")]);
    }

    #[tokio::test]
    async fn test_rejected_request_uses_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "too long"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_message(&ThreadId::from("t1"), Role::User, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 422, ref message } if message == "too long"));
    }

    #[tokio::test]
    async fn test_generate_title_accepts_bare_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_TITLE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("  Rust lifetimes  "))
            .mount(&server)
            .await;

        let title = client(&server).generate_title("how do lifetimes").await.unwrap();
        assert_eq!(title, "Rust lifetimes");
    }

    #[test]
    fn test_read_body() {
        assert_eq!(read_body(""), Value::Null);
        assert_eq!(read_body("plain"), Value::String("plain".into()));
        assert_eq!(read_body(r#"{"a":1}"#), json!({"a": 1}));
    }
}
