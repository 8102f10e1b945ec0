use std::sync::Arc;

use tracing::info;

use crate::backend::Backend;
use crate::model::{User, UserMetadata};
use crate::store::StoreHandle;
use crate::AppResult;

/// Unified sign-up/sign-in/sign-out/session surface over either backing.
/// The local store holds the current identity: in mock mode it is the
/// source of truth, in remote mode a cache of the hosted session.
#[derive(Clone)]
pub struct AuthService {
    backend: Arc<dyn Backend>,
    store: StoreHandle,
}

impl AuthService {
    pub(crate) fn new(backend: Arc<dyn Backend>, store: StoreHandle) -> Self {
        AuthService { backend, store }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User> {
        let user = self.backend.sign_up(email, password, metadata).await?;
        self.store.set_user(&user)?;
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self.backend.sign_in(email, password).await?;
        self.store.set_user(&user)?;
        Ok(user)
    }

    /// Clears the cached identity (and the hosted session in remote mode).
    /// Navigation afterwards is the embedding shell's decision.
    pub async fn sign_out(&self) -> AppResult<()> {
        self.backend.sign_out().await?;
        self.store.clear_user()?;
        info!(target: "dealdone", event = "session_cleared");
        Ok(())
    }

    /// Synchronous read of the cached identity.
    pub fn current_user(&self) -> Option<User> {
        self.store.user()
    }

    /// Re-fetches the identity from the backing and overwrites the cache to
    /// match, clearing it when the session is gone.
    pub async fn refresh_session(&self) -> AppResult<Option<User>> {
        let user = self.backend.fetch_user().await?;
        match &user {
            Some(user) => self.store.set_user(user)?,
            None => self.store.clear_user()?,
        }
        Ok(user)
    }
}
