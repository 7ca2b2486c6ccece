//! The read contract of the external credential store.

use crate::error::Result;
use async_trait::async_trait;
use bazaar_core::{SourceId, UserId};
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::Zeroizing;

/// Field name to value map, as stored.
///
/// Values are wiped when the map (or any clone of it) is dropped.
pub type CredentialFields = HashMap<String, Zeroizing<String>>;

/// Read-only view of wherever credentials are kept.
///
/// The engine never writes through this trait.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Credential stored for `user_id` on `source_id`, if any.
    async fn user_credential(
        &self,
        user_id: &UserId,
        source_id: &SourceId,
    ) -> Result<Option<CredentialFields>>;

    /// Application-wide credential for `source_id`, if any.
    async fn app_credential(&self, source_id: &SourceId) -> Result<Option<CredentialFields>>;
}

/// Credential store held in process memory.
///
/// Used when no external store is wired in, and by tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    user: RwLock<HashMap<(UserId, SourceId), CredentialFields>>,
    app: RwLock<HashMap<SourceId, CredentialFields>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a user-scoped credential.
    pub fn insert_user(&self, user_id: UserId, source_id: SourceId, fields: CredentialFields) {
        self.user
            .write()
            .expect("acquire write lock on user credentials")
            .insert((user_id, source_id), fields);
    }

    /// Store an application-level credential.
    pub fn insert_app(&self, source_id: SourceId, fields: CredentialFields) {
        self.app
            .write()
            .expect("acquire write lock on app credentials")
            .insert(source_id, fields);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn user_credential(
        &self,
        user_id: &UserId,
        source_id: &SourceId,
    ) -> Result<Option<CredentialFields>> {
        let user = self
            .user
            .read()
            .expect("acquire read lock on user credentials");
        Ok(user.get(&(user_id.clone(), source_id.clone())).cloned())
    }

    async fn app_credential(&self, source_id: &SourceId) -> Result<Option<CredentialFields>> {
        let app = self
            .app
            .read()
            .expect("acquire read lock on app credentials");
        Ok(app.get(source_id).cloned())
    }
}
