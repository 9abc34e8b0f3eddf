//! Backend records and worker communication structures
//!
//! Records carry only the columns the portal reads; other columns are ignored.

use bevy::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    mpsc::{Receiver, Sender},
};
use std::time::Duration;

use crate::backend::error::BackendError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated identity as returned by the token endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now.timestamp())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointEvent {
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Per-user module switch stored as backend metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRow {
    pub user_id: String,
    pub module: String,
    #[serde(default)]
    pub metadata: Value,
}

impl EntitlementRow {
    pub fn new(user_id: &str, module: &str, enabled: bool, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            module: module.to_string(),
            metadata: serde_json::json!({
                "enabled": enabled,
                "toggled_at": at.to_rfc3339(),
            }),
        }
    }

    pub fn enabled(&self) -> bool {
        self.metadata
            .get("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Brand,
    Event,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A brand or event awaiting moderation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub kind: SubmissionKind,
    pub title: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModerationDecision {
    Approve,
    Reject { reason: Option<String> },
}

/// Which call a failure belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendOp {
    SignIn,
    MagicLink,
    SignOut,
    Profile,
    Brand,
    Points,
    Entitlements,
    Submissions,
    Decide,
}

/// Commands for the backend worker thread
#[derive(Debug)]
pub enum BackendCommand {
    SignInWithPassword { email: String, password: String },
    SendMagicLink { email: String },
    SignOut { token: String },
    FetchProfile { user_id: String, token: String },
    FetchBrand { owner_id: String, token: String },
    FetchPoints { user_id: String, token: String },
    FetchEntitlements { user_id: String, token: String },
    UpsertEntitlement { row: EntitlementRow, token: String, generation: u64 },
    ListPendingSubmissions { token: String },
    DecideSubmission { submission: Submission, decision: ModerationDecision, token: String },
}

/// Results from the backend worker thread
#[derive(Debug)]
pub enum BackendResult {
    SignedIn(Session),
    MagicLinkSent { email: String },
    SignedOut,
    Profile(Option<Profile>),
    Brand { owner_id: String, brand: Option<Brand> },
    Points(Vec<PointEvent>),
    Entitlements(Vec<EntitlementRow>),
    EntitlementSaved { row: EntitlementRow, generation: u64 },
    EntitlementFailed { module: String, generation: u64, error: BackendError },
    Submissions(Vec<Submission>),
    SubmissionDecided(Submission),
    Failed { op: BackendOp, error: BackendError },
}

/// Resource containing channels for communicating with the backend worker thread
#[derive(Resource)]
pub struct BackendChannels {
    pub cmd_tx: Sender<BackendCommand>,
    pub res_rx: Arc<Mutex<Receiver<BackendResult>>>,
}

#[derive(Resource, Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    /// Re-fetch period of watched rows
    pub watch_interval: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:54321".to_string(),
            api_key: String::new(),
            watch_interval: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_from_token_response() {
        let body = r#"{
            "access_token":"jwt","token_type":"bearer","expires_in":3600,"expires_at":1700003600,
            "refresh_token":"r1","user":{"id":"u-1","email":"grower@example.com","aud":"authenticated"}
        }"#;
        let session: Session = serde_json::from_str(body).unwrap();
        assert_eq!(session.user.id, "u-1");
        assert_eq!(session.user.email.as_deref(), Some("grower@example.com"));
        let before = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let after = Utc.timestamp_opt(1_700_003_600, 0).unwrap();
        assert!(!session.is_expired(before));
        assert!(session.is_expired(after));
    }

    #[test]
    fn entitlement_metadata_reports_enabled() {
        let row = EntitlementRow::new("u-1", "marketplace", true, Utc::now());
        assert!(row.enabled());
        let missing: EntitlementRow =
            serde_json::from_str(r#"{"user_id":"u-1","module":"analytics"}"#).unwrap();
        assert!(!missing.enabled());
    }

    #[test]
    fn submission_enums_are_lowercase() {
        let s: Submission = serde_json::from_str(
            r#"{"id":"s1","kind":"event","title":"Hemp Expo","status":"pending","extra":1}"#,
        )
        .unwrap();
        assert_eq!(s.kind, SubmissionKind::Event);
        assert_eq!(s.status, SubmissionStatus::Pending);
    }
}
