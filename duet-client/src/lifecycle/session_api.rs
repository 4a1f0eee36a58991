use async_trait::async_trait;
use duet_core::{DenyReason, DuetError, Feedback, IceConfig, Session, SessionId, UserId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

/// Session API consumed by the client.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn get_session(&self, id: &SessionId, requesting_user: UserId)
    -> Result<Session, DuetError>;

    /// Idempotent; completing a completed session succeeds.
    async fn complete_session(&self, id: &SessionId, requesting_user: UserId)
    -> Result<Session, DuetError>;

    async fn submit_feedback(
        &self,
        id: &SessionId,
        from_user_id: UserId,
        to_user_id: UserId,
        rating: u8,
        comments: &str,
    ) -> Result<Feedback, DuetError>;

    async fn get_ice_config(&self, user_id: UserId) -> Result<IceConfig, DuetError>;
}

/// `SessionApi` over the server's HTTP endpoints.
#[derive(Clone)]
pub struct HttpSessionApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSessionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        res: Result<reqwest::Response, reqwest::Error>,
        session: Option<&SessionId>,
    ) -> Result<T, DuetError> {
        let res = res.map_err(|e| DuetError::NetworkDisconnect(e.to_string()))?;
        let status = res.status();
        if status.is_success() {
            return res
                .json()
                .await
                .map_err(|e| DuetError::Validation(format!("unexpected response body: {e}")));
        }

        let body = res.text().await.unwrap_or_default();
        debug!("Session API returned {}: {}", status, body);
        Err(match status {
            StatusCode::NOT_FOUND => match session {
                Some(id) => DuetError::SessionNotFound(id.clone()),
                None => DuetError::Validation(body),
            },
            StatusCode::FORBIDDEN => DuetError::Authorization(DenyReason::NotAParticipant),
            StatusCode::CONFLICT => DuetError::Validation(format!("conflict: {body}")),
            StatusCode::UNPROCESSABLE_ENTITY => DuetError::Validation(body),
            other => {
                warn!("Session API failure {}", other);
                DuetError::NetworkDisconnect(format!("session API returned {other}"))
            }
        })
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn get_session(
        &self,
        id: &SessionId,
        requesting_user: UserId,
    ) -> Result<Session, DuetError> {
        let res = self
            .http
            .get(format!("{}/api/sessions/{}", self.base_url, id))
            .query(&[("userId", requesting_user.0)])
            .send()
            .await;
        self.decode(res, Some(id)).await
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        requesting_user: UserId,
    ) -> Result<Session, DuetError> {
        let res = self
            .http
            .post(format!("{}/api/sessions/{}/complete", self.base_url, id))
            .json(&json!({ "userId": requesting_user }))
            .send()
            .await;
        self.decode(res, Some(id)).await
    }

    async fn submit_feedback(
        &self,
        id: &SessionId,
        from_user_id: UserId,
        to_user_id: UserId,
        rating: u8,
        comments: &str,
    ) -> Result<Feedback, DuetError> {
        let res = self
            .http
            .post(format!("{}/api/sessions/{}/feedback", self.base_url, id))
            .json(&json!({
                "fromUserId": from_user_id,
                "toUserId": to_user_id,
                "rating": rating,
                "comments": comments,
            }))
            .send()
            .await;

        match self.decode(res, Some(id)).await {
            Err(DuetError::Validation(msg)) if msg.starts_with("conflict") => {
                Err(DuetError::DuplicateFeedback {
                    session: id.clone(),
                    from: from_user_id,
                })
            }
            other => other,
        }
    }

    async fn get_ice_config(&self, user_id: UserId) -> Result<IceConfig, DuetError> {
        let res = self
            .http
            .get(format!("{}/api/ice-config", self.base_url))
            .query(&[("userId", user_id.0)])
            .send()
            .await;
        self.decode(res, None).await
    }
}
