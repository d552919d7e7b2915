//! License activation: validates a code remotely and remembers the result.
pub mod client;
pub mod device;

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::kv::KeyValueStore;
use crate::prompts::now_millis;
use client::ActivationClient;
use device::DeviceInfo;

pub const ACTIVATION_KEY: &str = "activation";

#[derive(thiserror::Error, Debug)]
pub enum ActivationError {
    #[error("activation code must not be empty")]
    EmptyCode,

    #[error("activation code has expired")]
    Expired,

    #[error("activation code has reached its device limit")]
    DeviceLimit,

    #[error("this device is already activated")]
    AlreadyActivated,

    #[error("invalid activation code")]
    InvalidCode,

    #[error("activation server error, please try again later")]
    Server,

    #[error("activation rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("network error, check your connection: {0}")]
    Network(String),

    #[error("unexpected activation response: {0}")]
    InvalidResponse(String),

    #[error("failed to save activation: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ActivationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivationError::Network(_) | ActivationError::Server => true,
            ActivationError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    #[default]
    Inactive,
    Activated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationState {
    pub status: ActivationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<String>,
}

impl ActivationState {
    pub fn is_activated(&self) -> bool {
        self.status == ActivationStatus::Activated && self.device_id.is_some()
    }
}

pub struct ActivationService {
    client: Arc<dyn ActivationClient>,
    kv: Arc<dyn KeyValueStore>,
    device: DeviceInfo,
}

impl ActivationService {
    pub fn new(client: Arc<dyn ActivationClient>, kv: Arc<dyn KeyValueStore>, device: DeviceInfo) -> Self {
        Self { client, kv, device }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Stored activation, or the inactive default when none can be read.
    pub async fn state(&self) -> ActivationState {
        let value = match self.kv.get(ACTIVATION_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return ActivationState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read activation state");
                return ActivationState::default();
            }
        };
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring malformed activation state");
            ActivationState::default()
        })
    }

    pub async fn activate(&self, code: &str) -> Result<ActivationState, ActivationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ActivationError::EmptyCode);
        }

        let response = self.client.validate(code, &self.device).await?;
        let state = ActivationState {
            status: ActivationStatus::Activated,
            device_id: Some(
                response
                    .device_id()
                    .unwrap_or(&self.device.device_id)
                    .to_string(),
            ),
            activation_time: Some(now_millis()),
            activation_code: Some(code.to_string()),
        };

        let value = serde_json::to_value(&state).context("failed to serialize activation state")?;
        self.kv
            .set(ACTIVATION_KEY, value)
            .await
            .context("failed to write activation state")?;

        tracing::info!(device_id = ?state.device_id, "device activated");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testing::MemoryKeyValueStore;
    use async_trait::async_trait;
    use client::{ActivatedDevice, ActivationData, ActivationResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every code with a fixed outcome and counts calls.
    struct StubClient {
        accept: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ActivationClient for StubClient {
        async fn validate(
            &self,
            _code: &str,
            device: &DeviceInfo,
        ) -> Result<ActivationResponse, ActivationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.accept {
                return Err(ActivationError::InvalidCode);
            }
            Ok(ActivationResponse {
                message: None,
                data: Some(ActivationData {
                    device: Some(ActivatedDevice {
                        device_id: device.device_id.clone(),
                    }),
                }),
            })
        }
    }

    fn service(accept: bool, kv: Arc<MemoryKeyValueStore>) -> (ActivationService, Arc<StubClient>) {
        let client = Arc::new(StubClient {
            accept,
            calls: AtomicUsize::new(0),
        });
        let service = ActivationService::new(client.clone(), kv, DeviceInfo::current());
        (service, client)
    }

    #[tokio::test]
    async fn starts_inactive() {
        let (service, _) = service(true, Arc::new(MemoryKeyValueStore::default()));
        assert!(!service.state().await.is_activated());
    }

    #[tokio::test]
    async fn empty_code_never_reaches_the_server() {
        let (service, client) = service(true, Arc::new(MemoryKeyValueStore::default()));
        let err = service.activate("   ").await.unwrap_err();
        assert!(matches!(err, ActivationError::EmptyCode));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_activation_is_persisted() {
        let kv = Arc::new(MemoryKeyValueStore::default());
        let (service, _) = service(true, kv.clone());

        let state = service.activate(" CODE-1 ").await.unwrap();
        assert!(state.is_activated());
        assert_eq!(state.activation_code.as_deref(), Some("CODE-1"));
        assert_eq!(state.device_id.as_deref(), Some(service.device().device_id.as_str()));

        let raw = kv.raw(ACTIVATION_KEY).await.unwrap();
        assert_eq!(raw["status"], "activated");
        assert_eq!(service.state().await, state);
    }

    #[tokio::test]
    async fn rejected_activation_stores_nothing() {
        let kv = Arc::new(MemoryKeyValueStore::default());
        let (service, _) = service(false, kv.clone());
        assert!(matches!(
            service.activate("NOPE").await,
            Err(ActivationError::InvalidCode)
        ));
        assert!(kv.raw(ACTIVATION_KEY).await.is_none());
    }

    #[tokio::test]
    async fn storage_failure_is_reported() {
        let kv = Arc::new(MemoryKeyValueStore::default());
        kv.set_fail_writes(true);
        let (service, _) = service(true, kv);
        let err = service.activate("CODE").await.unwrap_err();
        assert!(matches!(err, ActivationError::Storage(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn malformed_state_reads_as_inactive() {
        let kv = Arc::new(MemoryKeyValueStore::default());
        kv.put_raw(ACTIVATION_KEY, serde_json::json!({ "status": 42 })).await;
        let (service, _) = service(true, kv);
        assert_eq!(service.state().await, ActivationState::default());
    }

    #[test]
    fn retryable_errors() {
        assert!(ActivationError::Network("reset".into()).is_retryable());
        assert!(ActivationError::Server.is_retryable());
        assert!(
            ActivationError::Rejected {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ActivationError::Expired.is_retryable());
        assert!(!ActivationError::InvalidCode.is_retryable());
    }
}
