//! Fan-out of one event to every recipient in a roster snapshot.
//!
//! Each recipient gets its own task under a per-call timeout; outcomes
//! are collected independently, so one slow or broken participant can
//! never abort or delay delivery to the others.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::callback::CallbackHandle;
use crate::error::DeliveryError;

/// Per-recipient outcome of a fan-out.
pub type FanOutOutcome = (String, Result<(), DeliveryError>);

pub struct BroadcastCoordinator {
    delivery_timeout: Duration,
}

impl BroadcastCoordinator {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self { delivery_timeout }
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Deliver a text message to every recipient.
    pub async fn fan_out_message(
        &self,
        sender: &str,
        body: &str,
        recipients: Vec<(String, CallbackHandle)>,
    ) -> Vec<FanOutOutcome> {
        let sender: Arc<str> = Arc::from(sender);
        let body: Arc<str> = Arc::from(body);
        let limit = self.delivery_timeout;

        let tasks: Vec<JoinHandle<FanOutOutcome>> = recipients
            .into_iter()
            .map(|(id, handle)| {
                let sender = Arc::clone(&sender);
                let body = Arc::clone(&body);
                tokio::spawn(async move {
                    let outcome = deliver(limit, handle.receive_message(&sender, &body)).await;
                    (id, outcome)
                })
            })
            .collect();

        collect_outcomes(tasks).await
    }

    /// Deliver a file attachment to every recipient.
    pub async fn fan_out_file(
        &self,
        sender: &str,
        file_name: &str,
        data: &[u8],
        recipients: Vec<(String, CallbackHandle)>,
    ) -> Vec<FanOutOutcome> {
        let sender: Arc<str> = Arc::from(sender);
        let file_name: Arc<str> = Arc::from(file_name);
        let data: Arc<[u8]> = Arc::from(data);
        let limit = self.delivery_timeout;

        let tasks: Vec<JoinHandle<FanOutOutcome>> = recipients
            .into_iter()
            .map(|(id, handle)| {
                let sender = Arc::clone(&sender);
                let file_name = Arc::clone(&file_name);
                let data = Arc::clone(&data);
                tokio::spawn(async move {
                    let outcome =
                        deliver(limit, handle.receive_file(&sender, &file_name, &data)).await;
                    (id, outcome)
                })
            })
            .collect();

        collect_outcomes(tasks).await
    }

    /// Push the current identity list to every recipient. Best-effort:
    /// failures are logged, never surfaced to whoever changed the
    /// roster.
    pub async fn fan_out_roster(
        &self,
        identities: Vec<String>,
        recipients: Vec<(String, CallbackHandle)>,
    ) {
        let identities: Arc<[String]> = identities.into();
        let limit = self.delivery_timeout;

        let tasks: Vec<JoinHandle<FanOutOutcome>> = recipients
            .into_iter()
            .map(|(id, handle)| {
                let identities = Arc::clone(&identities);
                tokio::spawn(async move {
                    let outcome = deliver(limit, handle.update_roster(&identities)).await;
                    (id, outcome)
                })
            })
            .collect();

        let outcomes = collect_outcomes(tasks).await;
        log_failures("roster update", &outcomes);
    }
}

/// Run one callback invocation under the delivery timeout.
pub(crate) async fn deliver<F>(limit: Duration, call: F) -> Result<(), DeliveryError>
where
    F: Future<Output = Result<(), DeliveryError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DeliveryError::Timeout),
    }
}

async fn collect_outcomes(tasks: Vec<JoinHandle<FanOutOutcome>>) -> Vec<FanOutOutcome> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for joined in join_all(tasks).await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!(error = %e, "fan-out task panicked"),
        }
    }
    outcomes
}

/// Log per-recipient failures without interrupting anything.
pub fn log_failures(operation: &str, outcomes: &[FanOutOutcome]) {
    for (recipient, outcome) in outcomes {
        if let Err(e) = outcome {
            warn!(recipient = %recipient, operation, error = %e, "delivery failed");
        }
    }
}
