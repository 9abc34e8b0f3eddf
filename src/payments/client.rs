//! Order endpoints of the payment functions

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::backend::error::BackendError;

/// Result of a capture call
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CaptureOutcome {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl CaptureOutcome {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("COMPLETED")
    }
}

/// Order id from a create-order response. Some deployments answer with
/// `orderID` instead of `id`.
pub fn order_id_from(body: &Value) -> Option<String> {
    ["id", "orderID", "orderId"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct PaymentsClient {
    http: reqwest::Client,
    base_url: String,
}

impl PaymentsClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, name: &str) -> Result<Url, BackendError> {
        Url::parse(&format!("{}/{}", self.base_url, name))
            .map_err(|e| BackendError::Transport(format!("invalid payments url: {}", e)))
    }

    async fn post(&self, name: &str, body: Value) -> Result<Value, BackendError> {
        let resp = self.http.post(self.endpoint(name)?).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(BackendError::from_status(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn create_order(&self, product_id: &str) -> Result<String, BackendError> {
        let body = self
            .post("create-order", json!({ "productId": product_id }))
            .await?;
        order_id_from(&body)
            .ok_or_else(|| BackendError::Decode("create-order response has no order id".to_string()))
    }

    pub async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome, BackendError> {
        let body = self
            .post("capture-order", json!({ "orderID": order_id }))
            .await?;
        Ok(serde_json::from_value(body)?)
    }
}
