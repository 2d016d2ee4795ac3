//! The capability interface the relay invokes on each participant.
//!
//! Transports implement this trait once per connection; the relay core
//! never sees a concrete socket or RPC type.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DeliveryError;

/// Notification operations the relay can invoke on a participant.
#[async_trait]
pub trait ParticipantCallback: Send + Sync {
    /// Deliver a chat message.
    async fn receive_message(&self, sender: &str, body: &str) -> Result<(), DeliveryError>;

    /// Deliver a file attachment.
    async fn receive_file(
        &self,
        sender: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<(), DeliveryError>;

    /// Deliver the current list of connected identities.
    async fn update_roster(&self, identities: &[String]) -> Result<(), DeliveryError>;
}

/// Shared handle to a participant's callback, owned by the roster for
/// the duration of the connection.
pub type CallbackHandle = Arc<dyn ParticipantCallback>;
