use std::sync::RwLock;

use crate::error::BlogResult;
use crate::session::identity::Identity;
use crate::session::record::SessionRecord;

/// The identity every component reads from, plus the record it is mirrored
/// to. Shared by `Arc` between the session store and the request gateway.
///
/// The record is written and the identity installed under the same write
/// lock, so a request can never pick up a credential that isn't persisted
/// yet (or one that has already been cleared).
#[derive(Debug)]
pub struct ActiveSession {
    identity: RwLock<Option<Identity>>,
    record: SessionRecord,
}

impl ActiveSession {
    pub fn new(record: SessionRecord) -> Self {
        Self {
            identity: RwLock::new(None),
            record,
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Bearer token for outbound requests.
    pub fn bearer(&self) -> Option<String> {
        self.identity
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|identity| identity.token.clone()))
    }

    /// Persist `identity` and make it the active one.
    pub fn activate(&self, identity: Identity) -> BlogResult<()> {
        let mut guard = self
            .identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.record.save(&identity)?;
        *guard = Some(identity);
        Ok(())
    }

    /// Install an identity that was just read from the record.
    pub(crate) fn restore(&self, identity: Identity) {
        let mut guard = self
            .identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(identity);
    }

    /// Forget the identity and delete the record.
    pub fn clear(&self) -> BlogResult<()> {
        let mut guard = self
            .identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
        self.record.remove()
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }
}
