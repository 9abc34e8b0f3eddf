//! REST client for the backend-as-a-service
//!
//! Auth goes to `/auth/v1`, table access to `/rest/v1` with PostgREST query
//! syntax (`column=eq.value`).

use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::backend::error::BackendError;
use crate::backend::types::{
    EntitlementRow, ModerationDecision, PointEvent, Session, Submission, SubmissionStatus,
};

pub const ENTITLEMENT_CONFLICT_TARGET: &str = "user_id,module";

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            .map_err(|e| BackendError::Transport(format!("invalid backend url: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("authorization", format!("Bearer {}", bearer))
            .header("accept", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(BackendError::from_status(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let url = self.endpoint("auth/v1/token", &[("grant_type", "password".to_string())])?;
        let req = self
            .request(Method::POST, url, None)
            .json(&json!({ "email": email, "password": password }));
        self.send_json(req).await
    }

    /// Emails a one-time sign-in link; the session arrives through the link.
    pub async fn send_magic_link(&self, email: &str) -> Result<(), BackendError> {
        let url = self.endpoint("auth/v1/otp", &[])?;
        let req = self
            .request(Method::POST, url, None)
            .json(&json!({ "email": email, "create_user": true }));
        self.send(req).await.map(|_| ())
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        let url = self.endpoint("auth/v1/logout", &[])?;
        self.send(self.request(Method::POST, url, Some(token)))
            .await
            .map(|_| ())
    }

    /// At most one row of `table` where `column` equals `value`.
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        token: &str,
    ) -> Result<Option<T>, BackendError> {
        let url = self.endpoint(
            &format!("rest/v1/{}", table),
            &[
                ("select", "*".to_string()),
                (column, format!("eq.{}", value)),
                ("limit", "1".to_string()),
            ],
        )?;
        let rows: Vec<T> = self
            .send_json(self.request(Method::GET, url, Some(token)))
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn fetch_point_events(&self, user_id: &str, token: &str) -> Result<Vec<PointEvent>, BackendError> {
        let url = self.endpoint(
            "rest/v1/points",
            &[
                ("select", "amount,reason".to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ],
        )?;
        self.send_json(self.request(Method::GET, url, Some(token)))
            .await
    }

    pub async fn fetch_entitlements(&self, user_id: &str, token: &str) -> Result<Vec<EntitlementRow>, BackendError> {
        let url = self.endpoint(
            "rest/v1/entitlements",
            &[
                ("select", "user_id,module,metadata".to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ],
        )?;
        self.send_json(self.request(Method::GET, url, Some(token)))
            .await
    }

    /// Insert-or-update keyed on (user_id, module) in a single statement, so
    /// concurrent toggles from several tabs never create duplicate rows.
    pub async fn upsert_entitlement(&self, row: &EntitlementRow, token: &str) -> Result<EntitlementRow, BackendError> {
        let url = self.endpoint(
            "rest/v1/entitlements",
            &[("on_conflict", ENTITLEMENT_CONFLICT_TARGET.to_string())],
        )?;
        let req = self
            .request(Method::POST, url, Some(token))
            .header("prefer", "resolution=merge-duplicates,return=representation")
            .json(row);
        let rows: Vec<EntitlementRow> = self.send_json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("upsert returned no row".to_string()))
    }

    pub async fn list_pending_submissions(&self, token: &str) -> Result<Vec<Submission>, BackendError> {
        let url = self.endpoint(
            "rest/v1/submissions",
            &[
                ("select", "*".to_string()),
                ("status", "eq.pending".to_string()),
                ("order", "created_at.asc".to_string()),
            ],
        )?;
        self.send_json(self.request(Method::GET, url, Some(token)))
            .await
    }

    /// The `status=eq.pending` filter makes a second decision on the same
    /// submission match zero rows instead of overwriting the first.
    pub async fn decide_submission(
        &self,
        id: &str,
        decision: &ModerationDecision,
        token: &str,
    ) -> Result<Submission, BackendError> {
        let url = self.endpoint(
            "rest/v1/submissions",
            &[
                ("id", format!("eq.{}", id)),
                ("status", "eq.pending".to_string()),
            ],
        )?;
        let req = self
            .request(Method::PATCH, url, Some(token))
            .header("prefer", "return=representation")
            .json(&decision_body(decision));
        let rows: Vec<Submission> = self.send_json(req).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Conflict(format!("submission {} is no longer pending", id)))
    }
}

pub fn decision_body(decision: &ModerationDecision) -> serde_json::Value {
    match decision {
        ModerationDecision::Approve => json!({ "status": SubmissionStatus::Approved }),
        ModerationDecision::Reject { reason } => json!({
            "status": SubmissionStatus::Rejected,
            "rejection_reason": reason,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BackendClient {
        BackendClient::new(reqwest::Client::new(), "https://abc.example.co/", "anon")
    }

    #[test]
    fn endpoint_encodes_postgrest_filters() {
        let url = client()
            .endpoint(
                "rest/v1/brands",
                &[
                    ("owner_id", "eq.5f0c-aa".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.example.co/rest/v1/brands?owner_id=eq.5f0c-aa&limit=1"
        );
    }

    #[test]
    fn upsert_uses_conflict_target() {
        let url = client()
            .endpoint(
                "rest/v1/entitlements",
                &[("on_conflict", ENTITLEMENT_CONFLICT_TARGET.to_string())],
            )
            .unwrap();
        assert_eq!(url.query(), Some("on_conflict=user_id%2Cmodule"));
    }

    #[test]
    fn bad_base_url_is_transport_error() {
        let bad = BackendClient::new(reqwest::Client::new(), "not a url", "anon");
        assert!(matches!(
            bad.endpoint("rest/v1/brands", &[]),
            Err(BackendError::Transport(_))
        ));
    }

    #[test]
    fn decision_bodies() {
        assert_eq!(
            decision_body(&ModerationDecision::Approve),
            json!({"status": "approved"})
        );
        assert_eq!(
            decision_body(&ModerationDecision::Reject {
                reason: Some("duplicate listing".to_string())
            }),
            json!({"status": "rejected", "rejection_reason": "duplicate listing"})
        );
    }
}
