// lib/src/notifications.rs
//
// Welcome notifications for newly registered patients. Delivery is
// best-effort: it runs on its own task and a failure is only logged.

use std::sync::Arc;

use async_trait::async_trait;
use models::{HospitalError, HospitalResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::NotificationSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMessage {
    pub email: String,
    pub name: String,
    pub patient_id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WelcomeNotifier: Send + Sync {
    async fn send_welcome(&self, message: &WelcomeMessage) -> HospitalResult<()>;
}

/// Posts the message as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpWelcomeNotifier {
    client: Client,
    endpoint: String,
}

impl HttpWelcomeNotifier {
    pub fn new(settings: &NotificationSettings) -> HospitalResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| HospitalError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpWelcomeNotifier { client, endpoint: settings.welcome_url.clone() })
    }
}

#[async_trait]
impl WelcomeNotifier for HttpWelcomeNotifier {
    async fn send_welcome(&self, message: &WelcomeMessage) -> HospitalResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| HospitalError::NetworkError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(HospitalError::NetworkError(format!("Welcome endpoint returned {}: {}", status, body)))
        }
    }
}

/// Used when notifications are switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl WelcomeNotifier for DisabledNotifier {
    async fn send_welcome(&self, message: &WelcomeMessage) -> HospitalResult<()> {
        debug!("Notifications disabled; not welcoming patient {}", message.patient_id);
        Ok(())
    }
}

pub fn notifier_from_settings(settings: &NotificationSettings) -> HospitalResult<Arc<dyn WelcomeNotifier>> {
    if settings.enabled {
        Ok(Arc::new(HttpWelcomeNotifier::new(settings)?))
    } else {
        Ok(Arc::new(DisabledNotifier))
    }
}

/// Sends the message on a detached task. The caller never waits on it.
pub fn spawn_welcome(notifier: Arc<dyn WelcomeNotifier>, message: WelcomeMessage) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send_welcome(&message).await {
            Ok(()) => debug!("Welcome notification sent for patient {}", message.patient_id),
            Err(e) => warn!("Failed to send welcome notification for patient {}: {}", message.patient_id, e),
        }
    })
}
