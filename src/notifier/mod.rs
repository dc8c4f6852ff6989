mod registry;
mod webhook;

pub use registry::SubscriberRegistry;
pub use webhook::WebhookNotifier;

use crate::domain::ChangeRecord;
use crate::inpars::Listing;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("subscriber rejected event ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("subscriber is gone ({status})")]
    Gone { status: u16 },
}

impl NotifyError {
    /// The subscriber should be dropped rather than retried later.
    pub fn is_permanent(&self) -> bool {
        matches!(self, NotifyError::Gone { .. })
    }
}

/// Outcome of sending one event to one subscriber.
#[derive(Debug)]
pub struct Delivery {
    pub subscriber: String,
    pub result: Result<(), NotifyError>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outbound side of the monitor. Retrying failed deliveries and pruning dead
/// subscribers is the notifier's business; the monitor only logs results.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn has_subscribers(&self) -> bool;

    async fn notify_new(&self, listing: &Listing) -> Vec<Delivery>;

    async fn notify_changed(&self, listing: &Listing, changes: &[ChangeRecord]) -> Vec<Delivery>;
}
