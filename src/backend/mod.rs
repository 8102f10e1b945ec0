use async_trait::async_trait;

use crate::model::{Business, BusinessInput, Message, MessageDraft, User, UserMetadata};
use crate::realtime::Subscription;
use crate::AppResult;

mod mock;
mod remote;

pub use mock::MockBackend;
pub use remote::RemoteBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Remote,
    Mock,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Remote => "remote",
            BackendKind::Mock => "mock",
        }
    }
}

/// The capability set both backings implement. Selected once at client
/// construction; callers never branch on which variant is live.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<User>;

    async fn sign_out(&self) -> AppResult<()>;

    /// The identity the backing currently considers signed in, if any.
    async fn fetch_user(&self) -> AppResult<Option<User>>;

    async fn businesses(&self) -> AppResult<Vec<Business>>;

    async fn business_by_owner(&self, owner_id: &str) -> AppResult<Option<Business>>;

    async fn save_business(&self, input: BusinessInput) -> AppResult<Business>;

    async fn messages_for(&self, user_id: &str) -> AppResult<Vec<Message>>;

    async fn send_message(&self, draft: MessageDraft) -> AppResult<Message>;

    async fn unread_count(&self, user_id: &str) -> AppResult<u64>;

    async fn mark_as_read(&self, ids: &[String]) -> AppResult<()>;

    /// `Ok(None)` means no real-time channel is available, which is a
    /// recognized mode rather than an error.
    async fn subscribe_messages(&self, user_id: &str) -> AppResult<Option<Subscription>>;
}
