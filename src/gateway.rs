use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BlogError, BlogResult};
use crate::ownership::{classify_auth_failure, AuthFailure};
use crate::session::ActiveSession;

/// Sends requests to the blog API with the active credential attached, and
/// turns error statuses into `BlogError`s.
///
/// A 401 from any endpoint clears the session before the error is returned.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    session: Arc<ActiveSession>,
}

impl Gateway {
    pub fn new(
        base_url: &str,
        timeout: Option<Duration>,
        session: Arc<ActiveSession>,
    ) -> BlogResult<Self> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<ActiveSession> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request builder with the bearer token read at call time.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.session.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn send(&self, builder: RequestBuilder) -> BlogResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!("Request failed: {}", e);
            BlogError::Network(e.to_string())
        })?;
        self.check(response).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BlogResult<T> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check(&self, response: Response) -> BlogResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        Err(self.status_error(status, message))
    }

    fn status_error(&self, status: StatusCode, message: String) -> BlogError {
        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::info!("Server rejected credential, signing out");
                if let Err(e) = self.session.clear() {
                    tracing::warn!("Failed to clear session record: {}", e);
                }
                BlogError::Unauthorized(message)
            }
            StatusCode::FORBIDDEN => {
                let identity = self.session.current();
                match classify_auth_failure(status.as_u16(), identity.as_ref()) {
                    AuthFailure::StaleToken => BlogError::StaleToken,
                    AuthFailure::Forbidden => BlogError::Permission(if message.is_empty() {
                        "Forbidden".to_string()
                    } else {
                        message
                    }),
                }
            }
            StatusCode::NOT_FOUND => BlogError::NotFound,
            _ => BlogError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// Pull a human-readable message out of an error body. The server answers
/// with a bare string, a JSON string, or an object carrying `message`.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        _ => body.trim().to_string(),
    }
}
