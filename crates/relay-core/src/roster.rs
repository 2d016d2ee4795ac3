//! Live mapping of participant identities to their callback handles.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::callback::CallbackHandle;
use crate::error::RelayError;

/// Identity used by the relay for its own announcements; never
/// assignable to a participant.
pub const RESERVED_IDENTITY: &str = "Server";

/// The set of currently connected participants.
///
/// The lock guards only in-memory map updates and snapshot copies; it
/// is never held across an outbound call, so a slow participant can
/// never block registration.
#[derive(Default)]
pub struct Roster {
    inner: Mutex<HashMap<String, CallbackHandle>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant. Fails if the identity is empty, reserved,
    /// malformed, or already taken; no side effects on failure.
    pub fn register(&self, identity: &str, handle: CallbackHandle) -> Result<(), RelayError> {
        if identity.is_empty() {
            return Err(RelayError::EmptyIdentity);
        }
        // identities become sender tokens in the line-oriented history
        // log, so whitespace and control characters would corrupt it
        if identity
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(RelayError::InvalidIdentity(identity.to_string()));
        }
        if identity == RESERVED_IDENTITY {
            return Err(RelayError::ReservedIdentity);
        }

        let mut inner = self.inner.lock();
        match inner.entry(identity.to_string()) {
            Entry::Occupied(_) => Err(RelayError::DuplicateIdentity(identity.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Idempotent removal; returns whether the identity was present.
    pub fn unregister(&self, identity: &str) -> bool {
        self.inner.lock().remove(identity).is_some()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.inner.lock().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Point-in-time copy of the membership for safe iteration without
    /// holding the roster lock during downstream calls.
    pub fn snapshot(&self) -> Vec<(String, CallbackHandle)> {
        self.inner
            .lock()
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect()
    }

    /// Sorted list of connected identities, for roster-change
    /// notifications.
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::ParticipantCallback;
    use crate::error::DeliveryError;
    use async_trait::async_trait;

    struct NoopCallback;

    #[async_trait]
    impl ParticipantCallback for NoopCallback {
        async fn receive_message(&self, _: &str, _: &str) -> Result<(), DeliveryError> {
            Ok(())
        }
        async fn receive_file(&self, _: &str, _: &str, _: &[u8]) -> Result<(), DeliveryError> {
            Ok(())
        }
        async fn update_roster(&self, _: &[String]) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn handle() -> CallbackHandle {
        Arc::new(NoopCallback)
    }

    #[test]
    fn duplicate_identity_rejected() {
        let roster = Roster::new();
        roster.register("alice", handle()).unwrap();

        let err = roster.register("alice", handle()).unwrap_err();
        assert!(matches!(err, RelayError::DuplicateIdentity(id) if id == "alice"));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn reserved_and_empty_identities_rejected() {
        let roster = Roster::new();
        assert!(matches!(
            roster.register("Server", handle()),
            Err(RelayError::ReservedIdentity)
        ));
        assert!(matches!(
            roster.register("", handle()),
            Err(RelayError::EmptyIdentity)
        ));
        assert!(roster.is_empty());
    }

    #[test]
    fn identities_that_would_corrupt_the_history_log_are_rejected() {
        let roster = Roster::new();
        // a space would shift the sender/file-name split of a file line,
        // a newline would break one-event-per-line
        for id in ["Bob Smith", "a\nb", "tab\tbed", "trailing ", "bell\u{7}"] {
            assert!(
                matches!(
                    roster.register(id, handle()),
                    Err(RelayError::InvalidIdentity(rejected)) if rejected == id
                ),
                "{id:?} should be rejected"
            );
        }
        assert!(roster.is_empty());

        // punctuation without whitespace is fine
        roster.register("a:b", handle()).unwrap();
        roster.register("bob.smith", handle()).unwrap();
    }

    #[test]
    fn identity_is_case_sensitive() {
        let roster = Roster::new();
        roster.register("alice", handle()).unwrap();
        roster.register("Alice", handle()).unwrap();
        assert_eq!(roster.len(), 2);
        // "server" in lowercase is not the reserved identity
        roster.register("server", handle()).unwrap();
    }

    #[test]
    fn unregister_is_idempotent() {
        let roster = Roster::new();
        roster.register("bob", handle()).unwrap();

        assert!(roster.unregister("bob"));
        assert!(!roster.unregister("bob"));
        assert!(!roster.unregister("never-joined"));
        assert!(roster.is_empty());
    }

    #[test]
    fn identities_are_sorted() {
        let roster = Roster::new();
        for id in ["carol", "alice", "bob"] {
            roster.register(id, handle()).unwrap();
        }
        assert_eq!(roster.identities(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let roster = Roster::new();
        roster.register("alice", handle()).unwrap();

        let snapshot = roster.snapshot();
        roster.register("bob", handle()).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "alice");
        assert_eq!(roster.len(), 2);
    }
}
