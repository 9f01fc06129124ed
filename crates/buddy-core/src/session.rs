use tracing::debug;

use crate::store::{SharedStore, SESSION_KEY};
use crate::{Identity, IdentityGate, Result};

/// The signed-in identity for this device, kept in the same key-value store as
/// the collections.
#[derive(Clone)]
pub struct SessionStore {
    kv: SharedStore,
}

impl SessionStore {
    pub fn new(kv: SharedStore) -> Self {
        Self { kv }
    }

    pub fn sign_in(&self, gate: &IdentityGate, raw: &str) -> Result<Identity> {
        let identity = gate.validate(raw)?;
        self.kv.set(SESSION_KEY, identity.as_str())?;
        debug!(identity = %identity, "signed in");
        Ok(identity)
    }

    /// `None` means the caller should redirect to sign-in.
    pub fn current(&self, gate: &IdentityGate) -> Option<Identity> {
        gate.require_session(self.kv.get(SESSION_KEY).as_deref())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.kv.remove(SESSION_KEY)
    }
}
