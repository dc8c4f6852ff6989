use crate::domain::ChangeRecord;
use crate::inpars::Listing;
use crate::notifier::{Delivery, Notifier, NotifyError, SubscriberRegistry};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum EventKind {
    New,
    Updated,
}

#[derive(Serialize)]
struct EventPayload<'a> {
    kind: EventKind,
    listing: &'a Listing,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    changes: &'a [ChangeRecord],
}

/// Posts each event as JSON to every registered endpoint.
///
/// Endpoints answering 403, 404 or 410 are treated as permanently gone and
/// dropped from the registry.
pub struct WebhookNotifier {
    client: Client,
    registry: Arc<SubscriberRegistry>,
}

impl WebhookNotifier {
    pub fn new(registry: Arc<SubscriberRegistry>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        Ok(Self { client, registry })
    }

    async fn broadcast(&self, payload: &EventPayload<'_>) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        for endpoint in self.registry.list() {
            let result = self.send(&endpoint, payload).await;

            if let Err(e) = &result {
                if e.is_permanent() && self.registry.unregister(&endpoint) {
                    info!(subscriber = %endpoint, error = %e, "removed unreachable subscriber");
                }
            }

            deliveries.push(Delivery {
                subscriber: endpoint,
                result,
            });
        }

        deliveries
    }

    async fn send(&self, endpoint: &str, payload: &EventPayload<'_>) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if is_gone(status) {
            return Err(NotifyError::Gone {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.unwrap_or_else(|_| "(no body)".to_string());
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn has_subscribers(&self) -> bool {
        !self.registry.is_empty()
    }

    async fn notify_new(&self, listing: &Listing) -> Vec<Delivery> {
        let payload = EventPayload {
            kind: EventKind::New,
            listing,
            changes: &[],
        };
        self.broadcast(&payload).await
    }

    async fn notify_changed(&self, listing: &Listing, changes: &[ChangeRecord]) -> Vec<Delivery> {
        let payload = EventPayload {
            kind: EventKind::Updated,
            listing,
            changes,
        };
        self.broadcast(&payload).await
    }
}

fn is_gone(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE
    )
}
