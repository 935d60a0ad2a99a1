use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEvent {
    AppointmentBooked,
    AppointmentRescheduled,
    AppointmentCancelled,
    AppointmentCompleted,
}

/// Fire-and-forget webhook dispatch. Scheduling state never depends on the
/// outcome: a failed or slow webhook is logged and swallowed.
pub struct NotificationService {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        // A blank NOTIFY_WEBHOOK_URL counts as unconfigured.
        let webhook_url = if config.is_notification_configured() {
            config.notify_webhook_url.clone()
        } else {
            None
        };

        Self {
            client,
            webhook_url,
        }
    }

    pub async fn dispatch(&self, event: AppointmentEvent, appointment: &Appointment) {
        let Some(url) = &self.webhook_url else {
            debug!("Notification webhook not configured, skipping dispatch");
            return;
        };

        let payload = json!({
            "event": event,
            "appointment_id": appointment.id,
            "client_id": appointment.client_id,
            "therapist_id": appointment.therapist_id,
            "date": appointment.date,
            "start_time": appointment.time_slot.start_time,
            "status": appointment.status,
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(
                    "Notification dispatched for appointment {}",
                    appointment.id
                );
            }
            Ok(response) => {
                warn!(
                    "Notification webhook returned {} for appointment {}",
                    response.status(),
                    appointment.id
                );
            }
            Err(err) => {
                warn!(
                    "Notification webhook failed for appointment {}: {}",
                    appointment.id, err
                );
            }
        }
    }
}
