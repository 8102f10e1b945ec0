use std::sync::Arc;

use crate::backend::Backend;
use crate::model::{Business, BusinessInput, Message, MessageDraft};
use crate::realtime::Subscription;
use crate::{AppError, AppResult};

/// Business and message operations, uniform over either backing.
#[derive(Clone)]
pub struct DataService {
    backend: Arc<dyn Backend>,
}

impl DataService {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        DataService { backend }
    }

    pub async fn businesses(&self) -> AppResult<Vec<Business>> {
        self.backend
            .businesses()
            .await
            .map_err(|err| operation(err, "list", "businesses"))
    }

    pub async fn business_by_owner(&self, owner_id: &str) -> AppResult<Option<Business>> {
        self.backend
            .business_by_owner(owner_id)
            .await
            .map_err(|err| {
                operation(err, "get_by_owner", "businesses").with_context("owner_id", owner_id)
            })
    }

    /// Upsert keyed by owner: a second save for the same owner updates the
    /// stored record in place.
    pub async fn save_business(&self, input: BusinessInput) -> AppResult<Business> {
        let owner_id = input.owner_id.clone();
        self.backend.save_business(input).await.map_err(|err| {
            operation(err, "save", "businesses").with_context("owner_id", owner_id)
        })
    }

    /// Everything the user sent or received, oldest first.
    pub async fn messages_for(&self, user_id: &str) -> AppResult<Vec<Message>> {
        self.backend
            .messages_for(user_id)
            .await
            .map_err(|err| operation(err, "list", "messages").with_context("user_id", user_id))
    }

    pub async fn send_message(&self, draft: MessageDraft) -> AppResult<Message> {
        self.backend
            .send_message(draft)
            .await
            .map_err(|err| operation(err, "insert", "messages"))
    }

    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.backend
            .unread_count(user_id)
            .await
            .map_err(|err| operation(err, "count", "messages").with_context("user_id", user_id))
    }

    pub async fn mark_as_read(&self, ids: &[String]) -> AppResult<()> {
        self.backend
            .mark_as_read(ids)
            .await
            .map_err(|err| operation(err, "mark_read", "messages"))
    }

    /// `None` means no real-time channel is available in this mode.
    pub async fn subscribe_messages(&self, user_id: &str) -> AppResult<Option<Subscription>> {
        self.backend
            .subscribe_messages(user_id)
            .await
            .map_err(|err| operation(err, "subscribe", "messages").with_context("user_id", user_id))
    }

    /// Releases the channel. Consuming the handle makes a double release
    /// unrepresentable; a cancelled handle is already a no-op.
    pub fn unsubscribe(&self, mut subscription: Subscription) {
        subscription.cancel();
    }
}

fn operation(err: AppError, op: &str, table: &str) -> AppError {
    err.with_context("operation", op.to_string())
        .with_context("table", table.to_string())
}
