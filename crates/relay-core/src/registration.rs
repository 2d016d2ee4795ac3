//! Join and leave orchestration.
//!
//! Join: roster insert, roster fan-out (including the joiner), ordered
//! history replay to the joiner only, then an announced join event.
//! Leave: roster removal, roster fan-out, announced departure event.

use tracing::{debug, info, warn};

use crate::blobs::BlobStore;
use crate::broadcast::{deliver, log_failures, BroadcastCoordinator};
use crate::callback::{CallbackHandle, ParticipantCallback};
use crate::error::RelayError;
use crate::history::{HistoryEvent, HistoryStore};
use crate::roster::{Roster, RESERVED_IDENTITY};

pub struct RegistrationProtocol<'a> {
    pub(crate) roster: &'a Roster,
    pub(crate) history: &'a HistoryStore,
    pub(crate) blobs: &'a BlobStore,
    pub(crate) broadcaster: &'a BroadcastCoordinator,
}

impl RegistrationProtocol<'_> {
    /// Register a participant. A uniqueness or reserved-name failure
    /// leaves no side effects.
    pub async fn join(&self, identity: &str, handle: CallbackHandle) -> Result<(), RelayError> {
        self.roster.register(identity, CallbackHandle::clone(&handle))?;
        info!(identity, "participant registered");

        self.push_roster().await;
        self.replay(identity, handle.as_ref()).await;
        self.announce(format!("{identity} has joined the server!"))
            .await;

        Ok(())
    }

    /// Unregister a participant. Idempotent: an unknown identity is a
    /// no-op and announces nothing.
    pub async fn leave(&self, identity: &str) {
        if !self.roster.unregister(identity) {
            debug!(identity, "unregister for unknown identity ignored");
            return;
        }
        info!(identity, "participant unregistered");

        self.push_roster().await;
        self.announce(format!("{identity} has left the server!"))
            .await;
    }

    async fn push_roster(&self) {
        let identities = self.roster.identities();
        let recipients = self.roster.snapshot();
        self.broadcaster.fan_out_roster(identities, recipients).await;
    }

    /// Resend the full history, in original order, to the new joiner
    /// only. A missing blob or a delivery failure skips that entry and
    /// continues.
    async fn replay(&self, identity: &str, handle: &dyn ParticipantCallback) {
        let events = self.history.events();
        if events.is_empty() {
            return;
        }
        info!(identity, events = events.len(), "replaying history");

        let limit = self.broadcaster.delivery_timeout();
        for event in events {
            let outcome = match &event {
                HistoryEvent::Text { sender, body } => {
                    deliver(limit, handle.receive_message(sender, body)).await
                }
                HistoryEvent::File {
                    file_name,
                    sender,
                    blob,
                } => match self.blobs.load(blob).await {
                    Ok(data) => {
                        deliver(limit, handle.receive_file(sender, file_name, &data)).await
                    }
                    Err(e) => {
                        warn!(identity, file_name = %file_name, error = %e,
                            "skipping file replay, blob unavailable");
                        continue;
                    }
                },
            };

            if let Err(e) = outcome {
                warn!(identity, error = %e, "history replay delivery failed");
            }
        }
    }

    /// Append a relay announcement to the history and broadcast it.
    async fn announce(&self, body: String) {
        self.history.append(HistoryEvent::Text {
            sender: RESERVED_IDENTITY.to_string(),
            body: body.clone(),
        });

        let recipients = self.roster.snapshot();
        let outcomes = self
            .broadcaster
            .fan_out_message(RESERVED_IDENTITY, &body, recipients)
            .await;
        log_failures("announcement", &outcomes);
    }
}
