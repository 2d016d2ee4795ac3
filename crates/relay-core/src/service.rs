//! The relay's entry point: composes roster, history, blobs and
//! broadcast under one owned state structure.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tracing::info;

use crate::blobs::BlobStore;
use crate::broadcast::{log_failures, BroadcastCoordinator};
use crate::callback::CallbackHandle;
use crate::error::RelayError;
use crate::history::{HistoryEvent, HistoryStore};
use crate::registration::RegistrationProtocol;
use crate::roster::Roster;

pub struct RelayService {
    roster: Roster,
    history: HistoryStore,
    blobs: BlobStore,
    broadcaster: BroadcastCoordinator,
}

impl RelayService {
    /// Open the relay state: ensure storage directories exist and load
    /// any persisted history.
    pub async fn open(
        history_path: impl Into<PathBuf>,
        blob_dir: impl Into<PathBuf>,
        delivery_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let history_path = history_path.into();
        let blob_dir = blob_dir.into();

        if let Some(parent) = history_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::create_dir_all(&blob_dir).await?;

        let history = HistoryStore::load(history_path).await;
        info!(events = history.len(), "relay state opened");

        Ok(Self {
            roster: Roster::new(),
            history,
            blobs: BlobStore::new(blob_dir),
            broadcaster: BroadcastCoordinator::new(delivery_timeout),
        })
    }

    fn protocol(&self) -> RegistrationProtocol<'_> {
        RegistrationProtocol {
            roster: &self.roster,
            history: &self.history,
            blobs: &self.blobs,
            broadcaster: &self.broadcaster,
        }
    }

    /// Register a participant: roster insert, roster fan-out, history
    /// replay to the joiner, join announcement.
    pub async fn register(
        &self,
        identity: &str,
        handle: CallbackHandle,
    ) -> Result<(), RelayError> {
        self.protocol().join(identity, handle).await
    }

    /// Unregister a participant; unknown identities are a no-op.
    pub async fn unregister(&self, identity: &str) {
        self.protocol().leave(identity).await
    }

    /// Append a text event and fan it out to the current roster
    /// snapshot, sender included (the echo confirms delivery order to
    /// the sender's own view).
    pub async fn broadcast_message(&self, sender: &str, body: &str) {
        self.history.append(HistoryEvent::Text {
            sender: sender.to_string(),
            body: body.to_string(),
        });

        let recipients = self.roster.snapshot();
        let outcomes = self
            .broadcaster
            .fan_out_message(sender, body, recipients)
            .await;
        log_failures("message", &outcomes);
    }

    /// Store the attachment bytes, append a file event, and fan the
    /// bytes out to the current roster snapshot, sender included.
    pub async fn broadcast_file(
        &self,
        sender: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<(), RelayError> {
        let blob = self.blobs.store(data).await?;
        self.history.append(HistoryEvent::File {
            file_name: file_name.to_string(),
            sender: sender.to_string(),
            blob,
        });

        let recipients = self.roster.snapshot();
        let outcomes = self
            .broadcaster
            .fan_out_file(sender, file_name, data, recipients)
            .await;
        log_failures("file", &outcomes);
        Ok(())
    }

    /// Flush the history log; called once at shutdown.
    pub async fn persist(&self) -> Result<(), RelayError> {
        self.history.persist().await
    }

    pub fn identities(&self) -> Vec<String> {
        self.roster.identities()
    }

    pub fn history_events(&self) -> Vec<HistoryEvent> {
        self.history.events()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }
}
