use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ActivationError;
use super::device::{DeviceInfo, DeviceMetadata};

const APP_ID: &str = "app_fEFqY0K9jA";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
pub trait ActivationClient: Send + Sync {
    async fn validate(
        &self,
        code: &str,
        device: &DeviceInfo,
    ) -> Result<ActivationResponse, ActivationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivationRequest<'a> {
    code: &'a str,
    device_id: &'a str,
    device_name: &'a str,
    os: &'a str,
    ip: &'a str,
    product_id: &'a str,
    app_id: &'a str,
    metadata: &'a DeviceMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<ActivationData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationData {
    #[serde(default)]
    pub device: Option<ActivatedDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedDevice {
    pub device_id: String,
}

impl ActivationResponse {
    pub fn device_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.device.as_ref())
            .map(|d| d.device_id.as_str())
    }
}

/// Validates codes against the remote activation endpoint.
///
/// Network failures and 5xx responses are retried with exponential backoff;
/// every other response is final.
pub struct HttpActivationClient {
    http_client: Arc<reqwest::Client>,
    endpoint: String,
    max_attempts: u32,
    base_delay: Duration,
}

impl HttpActivationClient {
    pub fn new(http_client: Arc<reqwest::Client>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    async fn send(&self, body: &ActivationRequest<'_>) -> Result<ActivationResponse, ActivationError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| ActivationError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ActivationError::Network(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| ActivationError::InvalidResponse(e.to_string()));
        }

        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or(text);
        Err(classify(status.as_u16(), &message))
    }
}

#[async_trait]
impl ActivationClient for HttpActivationClient {
    async fn validate(
        &self,
        code: &str,
        device: &DeviceInfo,
    ) -> Result<ActivationResponse, ActivationError> {
        let body = ActivationRequest {
            code,
            device_id: &device.device_id,
            device_name: &device.device_name,
            os: &device.os,
            ip: &device.ip,
            product_id: APP_ID,
            app_id: APP_ID,
            metadata: &device.metadata,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(&body).await {
                Ok(response) => {
                    tracing::info!(attempt, device_id = %device.device_id, "activation code accepted");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "activation request failed, retrying in {:?}...",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "activation failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Map a non-success response to an error. Messages are matched in English and Chinese.
pub fn classify(status: u16, message: &str) -> ActivationError {
    let lower = message.to_lowercase();

    match status {
        400 if mentions(&lower, &["expired", "过期"]) => ActivationError::Expired,
        400 if mentions(&lower, &["limit", "限制"]) => ActivationError::DeviceLimit,
        400 if mentions(&lower, &["already", "已激活"]) => ActivationError::AlreadyActivated,
        404 => ActivationError::InvalidCode,
        500 => ActivationError::Server,
        _ => ActivationError::Rejected {
            status,
            message: message.to_string(),
        },
    }
}

fn mentions(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
