use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::info;

use crate::backend::{Backend, BackendKind};
use crate::id::new_uuid_v7;
use crate::model::{Business, BusinessInput, Message, MessageDraft, User, UserMetadata, UserRole};
use crate::realtime::Subscription;
use crate::store::StoreHandle;
use crate::time::now_ms;
use crate::AppResult;

const DEMO_USER_ID: &str = "mock-demo-user";

/// Catalogue served when nothing has been persisted yet, so a fresh install
/// renders a populated marketplace. Persisted businesses win once present.
static DEMO_BUSINESSES: Lazy<Vec<Business>> = Lazy::new(|| {
    let seed = |id: &str, owner: &str, name: &str, industry: &str, revenue: i64, valuation: i64, description: &str| Business {
        id: id.to_string(),
        owner_id: owner.to_string(),
        name: name.to_string(),
        industry: Some(industry.to_string()),
        revenue,
        valuation,
        description: Some(description.to_string()),
        is_active: true,
        created_at: 0,
        updated_at: 0,
    };
    vec![
        seed(
            "demo-1",
            "demo-owner-1",
            "CloudScale SaaS",
            "Technology",
            300_000,
            1_200_000,
            "Profitable SaaS for cloud optimization.",
        ),
        seed(
            "demo-2",
            "demo-owner-2",
            "EcoBrew Coffee",
            "Food & Beverage",
            150_000,
            450_000,
            "Sustainable coffee chain with 5 locations.",
        ),
        seed(
            "demo-3",
            "demo-owner-3",
            "Titan Logistics",
            "Logistics",
            2_000_000,
            5_000_000,
            "Regional logistics & freight forwarder.",
        ),
    ]
});

/// Fallback backing over the local store. No network, no real-time channel.
pub struct MockBackend {
    store: StoreHandle,
}

impl MockBackend {
    pub fn new(store: StoreHandle) -> Self {
        MockBackend { store }
    }

    fn catalogue(&self) -> Vec<Business> {
        let persisted = self.store.businesses();
        if persisted.is_empty() {
            DEMO_BUSINESSES.clone()
        } else {
            persisted
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User> {
        let user = User {
            id: new_uuid_v7(),
            email: email.to_string(),
            metadata,
        };
        info!(target: "dealdone", event = "mock_sign_up", email);
        Ok(user)
    }

    async fn sign_in(&self, email: &str, _password: &str) -> AppResult<User> {
        info!(target: "dealdone", event = "mock_sign_in", email);
        Ok(User {
            id: DEMO_USER_ID.to_string(),
            email: email.to_string(),
            metadata: UserMetadata {
                full_name: Some("John Doe".to_string()),
                role: UserRole::Owner,
            },
        })
    }

    async fn sign_out(&self) -> AppResult<()> {
        Ok(())
    }

    async fn fetch_user(&self) -> AppResult<Option<User>> {
        Ok(self.store.user())
    }

    async fn businesses(&self) -> AppResult<Vec<Business>> {
        Ok(self.catalogue())
    }

    async fn business_by_owner(&self, owner_id: &str) -> AppResult<Option<Business>> {
        Ok(self
            .catalogue()
            .into_iter()
            .find(|b| b.owner_id == owner_id))
    }

    async fn save_business(&self, input: BusinessInput) -> AppResult<Business> {
        self.store.upsert_business(input)
    }

    async fn messages_for(&self, user_id: &str) -> AppResult<Vec<Message>> {
        let mut list: Vec<Message> = self
            .store
            .messages()
            .into_iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .collect();
        list.sort_by_key(|m| m.created_at);
        Ok(list)
    }

    async fn send_message(&self, draft: MessageDraft) -> AppResult<Message> {
        let message = Message {
            id: new_uuid_v7(),
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            is_read: false,
            created_at: now_ms(),
        };
        self.store.append_message(&message)?;
        Ok(message)
    }

    async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        let count = self
            .store
            .messages()
            .iter()
            .filter(|m| m.receiver_id == user_id && !m.is_read)
            .count();
        Ok(count as u64)
    }

    async fn mark_as_read(&self, ids: &[String]) -> AppResult<()> {
        self.store.mark_messages_read(ids)
    }

    async fn subscribe_messages(&self, _user_id: &str) -> AppResult<Option<Subscription>> {
        // No backend, no push channel. Callers treat this as "no real-time
        // available", not as a failure.
        Ok(None)
    }
}
