//! Delivery of queued actions to the remote API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use edureach_net::HttpTransport;
use edureach_shared::token::decode_claims;
use edureach_store::{LocalStore, StoreError};

use crate::error::SyncError;

/// Executes one pending action remotely.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn submit(&self, action: &str, payload: &Value) -> Result<(), SyncError>;
}

/// Where the session token is read from at send time.
pub trait TokenSource: Send + Sync {
    fn session_token(&self) -> Result<Option<String>, StoreError>;
}

impl TokenSource for LocalStore {
    fn session_token(&self) -> Result<Option<String>, StoreError> {
        self.open()?.session_token()
    }
}

/// `POST {base}/{action}` with the payload as JSON body.
pub struct HttpRemote {
    transport: HttpTransport,
    api_base: String,
    tokens: Arc<dyn TokenSource>,
}

impl HttpRemote {
    pub fn new(transport: HttpTransport, api_base: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            transport,
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn action_url(&self, action: &str) -> String {
        format!("{}/{}", self.api_base, action.trim_start_matches('/'))
    }

    /// The bearer token to send: none when no token is stored, an error when
    /// the stored one is unreadable or expired.
    fn bearer(&self) -> Result<Option<String>, SyncError> {
        let Some(token) = self.tokens.session_token()? else {
            return Ok(None);
        };
        let claims = decode_claims(&token)?;
        if claims.is_expired() {
            return Err(SyncError::TokenExpired);
        }
        Ok(Some(token))
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn submit(&self, action: &str, payload: &Value) -> Result<(), SyncError> {
        let bearer = self.bearer()?;
        let url = self.action_url(action);
        if bearer.is_none() {
            debug!(action, "no session token stored, sending unauthenticated");
        }
        self.transport
            .post_json(&url, bearer.as_deref(), payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    use edureach_net::NetworkFault;
    use edureach_shared::constants::TOKEN_KEY;

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    fn token(exp: i64) -> String {
        let payload = json!({ "exp": exp, "sub": "42", "role": "student" }).to_string();
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    async fn record(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        seen.lock().unwrap().push((auth, body));
        StatusCode::CREATED
    }

    async fn serve(seen: Seen) -> String {
        let router = Router::new()
            .route("/api/quiz/submit", post(record))
            .route("/api/attendance/mark", post(|| async { StatusCode::UNPROCESSABLE_ENTITY }))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn remote(base: &str, store: Arc<LocalStore>) -> HttpRemote {
        let transport = HttpTransport::new(Duration::from_secs(5), 1).unwrap();
        HttpRemote::new(transport, base, store)
    }

    #[test]
    fn action_url_joins_cleanly() {
        let r = remote("http://localhost:5000/api/", Arc::new(LocalStore::in_memory()));
        assert_eq!(r.action_url("quiz/submit"), "http://localhost:5000/api/quiz/submit");
        assert_eq!(r.action_url("/quiz/submit"), "http://localhost:5000/api/quiz/submit");
    }

    #[tokio::test]
    async fn posts_payload_with_bearer_token() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let store = Arc::new(LocalStore::in_memory());
        let valid = token(chrono::Utc::now().timestamp() + 3600);
        store.open().unwrap().set_item(TOKEN_KEY, &valid).unwrap();

        remote(&base, store)
            .submit("quiz/submit", &json!({ "quizId": 3, "answers": [1, 2] }))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, format!("Bearer {valid}"));
        assert_eq!(seen[0].1["quizId"], 3);
    }

    #[tokio::test]
    async fn missing_token_sends_no_header() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;

        remote(&base, Arc::new(LocalStore::in_memory()))
            .submit("quiz/submit", &json!({}))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap()[0].0, "");
    }

    #[tokio::test]
    async fn expired_or_malformed_token_fails_before_sending() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let store = Arc::new(LocalStore::in_memory());
        let db = store.open().unwrap();

        db.set_item(TOKEN_KEY, &token(1)).unwrap();
        let err = remote(&base, store.clone())
            .submit("quiz/submit", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::TokenExpired));

        db.set_item(TOKEN_KEY, "garbage").unwrap();
        let err = remote(&base, store)
            .submit("quiz/submit", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Token(_)));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let base = serve(Seen::default()).await;
        let err = remote(&base, Arc::new(LocalStore::in_memory()))
            .submit("attendance/mark", &json!({ "classId": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Network(NetworkFault::Status { status: 422, .. })
        ));
    }
}
