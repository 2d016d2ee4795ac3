//! Chat Relay Coordination Core
//!
//! Transport-agnostic relay logic: a live roster of participants,
//! an append-only replayable history with a blob side-store, and
//! failure-isolating broadcast fan-out. Network transports plug in
//! through the [`ParticipantCallback`] capability trait.

pub mod blobs;
pub mod broadcast;
pub mod callback;
pub mod error;
pub mod history;
pub mod registration;
pub mod roster;
pub mod service;

pub use blobs::{BlobId, BlobStore};
pub use broadcast::BroadcastCoordinator;
pub use callback::{CallbackHandle, ParticipantCallback};
pub use error::{DeliveryError, RelayError};
pub use history::{HistoryEvent, HistoryStore};
pub use registration::RegistrationProtocol;
pub use roster::{Roster, RESERVED_IDENTITY};
pub use service::RelayService;
