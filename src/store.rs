use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::id::new_uuid_v7;
use crate::model::{Business, BusinessInput, Message, User};
use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const USER_KEY: &str = "dealDoneUser";
pub const BUSINESSES_KEY: &str = "dealDoneBusinesses";
pub const MESSAGES_KEY: &str = "dealDoneMessages";

const STORE_FILE: &str = "store.json";

trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn save(&self) -> AppResult<()>;
}

struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    fn open(path: PathBuf) -> Self {
        let data = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        target: "dealdone",
                        event = "store_file_corrupt",
                        path = %path.display(),
                        error = %err
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        FileStore {
            path,
            data: Mutex::new(data),
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::from(e).with_context("path", self.path.display().to_string()))?;
        }
        let snapshot = self
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let raw = serde_json::to_string(&snapshot).map_err(AppError::from)?;
        fs::write(&self.path, raw)
            .map_err(|e| AppError::from(e).with_context("path", self.path.display().to_string()))
    }
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn save(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Shared handle over the client-local durable key/value store. Values are
/// JSON-encoded strings; a value that fails to parse is treated as absent
/// rather than crashing the page.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn KvStore>,
}

impl StoreHandle {
    /// File-backed store under the platform data directory.
    pub fn open_default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self::at_path(base.join("dealdone").join(STORE_FILE))
    }

    pub fn at_path(path: impl AsRef<Path>) -> Self {
        StoreHandle {
            inner: Arc::new(FileStore::open(path.as_ref().to_path_buf())),
        }
    }

    pub fn in_memory() -> Self {
        StoreHandle {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    pub fn set_raw(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner.set(key, value);
        self.inner.save()
    }

    pub fn remove(&self, key: &str) -> AppResult<()> {
        self.inner.remove(key);
        self.inner.save()
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target: "dealdone",
                    event = "store_value_corrupt",
                    key,
                    error = %err
                );
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let raw = serde_json::to_string(value).map_err(AppError::from)?;
        self.set_raw(key, &raw)
    }

    pub fn user(&self) -> Option<User> {
        self.get_json(USER_KEY)
    }

    pub fn set_user(&self, user: &User) -> AppResult<()> {
        self.set_json(USER_KEY, user)
    }

    pub fn clear_user(&self) -> AppResult<()> {
        self.remove(USER_KEY)
    }

    /// Insertion-ordered list of persisted businesses.
    pub fn businesses(&self) -> Vec<Business> {
        self.get_json(BUSINESSES_KEY).unwrap_or_default()
    }

    /// Insert-or-replace keyed by `owner_id`. A replacement keeps the stored
    /// id and created_at; an insert gets a fresh UUID and creation timestamp.
    pub fn upsert_business(&self, input: BusinessInput) -> AppResult<Business> {
        let mut list = self.businesses();
        let now = now_ms();

        let stored = match list.iter_mut().find(|b| b.owner_id == input.owner_id) {
            Some(existing) => {
                existing.name = input.name;
                existing.industry = input.industry;
                existing.revenue = input.revenue;
                existing.valuation = input.valuation;
                existing.description = input.description;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let created = Business {
                    id: new_uuid_v7(),
                    owner_id: input.owner_id,
                    name: input.name,
                    industry: input.industry,
                    revenue: input.revenue,
                    valuation: input.valuation,
                    description: input.description,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                list.push(created.clone());
                created
            }
        };

        self.set_json(BUSINESSES_KEY, &list)?;
        Ok(stored)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.get_json(MESSAGES_KEY).unwrap_or_default()
    }

    pub fn append_message(&self, message: &Message) -> AppResult<()> {
        let mut list = self.messages();
        list.push(message.clone());
        self.set_json(MESSAGES_KEY, &list)
    }

    /// Batch-flips `is_read`; ids that match nothing are ignored.
    pub fn mark_messages_read(&self, ids: &[String]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut list = self.messages();
        for message in list.iter_mut() {
            if ids.contains(&message.id) {
                message.is_read = true;
            }
        }
        self.set_json(MESSAGES_KEY, &list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserMetadata;
    use tempfile::tempdir;

    fn sample_user() -> User {
        User {
            id: "u1".into(),
            email: "jane@example.com".into(),
            metadata: UserMetadata {
                full_name: Some("Jane Doe".into()),
                role: Default::default(),
            },
        }
    }

    fn sample_input(owner: &str, name: &str) -> BusinessInput {
        BusinessInput {
            owner_id: owner.into(),
            name: name.into(),
            industry: Some("Technology".into()),
            revenue: 300_000,
            valuation: 1_200_000,
            description: None,
        }
    }

    #[test]
    fn user_round_trips() {
        let store = StoreHandle::in_memory();
        assert!(store.user().is_none());

        store.set_user(&sample_user()).unwrap();
        assert_eq!(store.user().unwrap().id, "u1");

        store.clear_user().unwrap();
        assert!(store.user().is_none());
    }

    #[test]
    fn corrupt_value_reads_as_absent() {
        let store = StoreHandle::in_memory();
        store.set_raw(USER_KEY, "{not json").unwrap();
        assert!(store.user().is_none());

        store.set_raw(BUSINESSES_KEY, "42").unwrap();
        assert!(store.businesses().is_empty());
    }

    #[test]
    fn upsert_keeps_one_business_per_owner() {
        let store = StoreHandle::in_memory();

        let first = store.upsert_business(sample_input("u1", "A")).unwrap();
        let second = store.upsert_business(sample_input("u1", "B")).unwrap();

        let list = store.businesses();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "B");
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn upsert_appends_for_new_owner() {
        let store = StoreHandle::in_memory();
        store.upsert_business(sample_input("u1", "A")).unwrap();
        store.upsert_business(sample_input("u2", "B")).unwrap();

        let list = store.businesses();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].owner_id, "u1");
        assert_eq!(list[1].owner_id, "u2");
        assert_ne!(list[0].id, list[1].id);
    }

    #[test]
    fn mark_messages_read_flips_only_requested_ids() {
        let store = StoreHandle::in_memory();
        for id in ["m1", "m2"] {
            store
                .append_message(&Message {
                    id: id.into(),
                    sender_id: "a".into(),
                    receiver_id: "b".into(),
                    content: "hi".into(),
                    is_read: false,
                    created_at: 1,
                })
                .unwrap();
        }

        store.mark_messages_read(&["m2".to_string()]).unwrap();
        let list = store.messages();
        assert!(!list[0].is_read);
        assert!(list[1].is_read);

        // Empty batch is a no-op.
        store.mark_messages_read(&[]).unwrap();
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn file_store_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store.json");

        let store = StoreHandle::at_path(&path);
        store.set_user(&sample_user()).unwrap();
        store.upsert_business(sample_input("u1", "A")).unwrap();
        drop(store);

        let reopened = StoreHandle::at_path(&path);
        assert_eq!(reopened.user().unwrap().email, "jane@example.com");
        assert_eq!(reopened.businesses().len(), 1);
    }

    #[test]
    fn file_store_with_corrupt_file_starts_empty() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(&path, "][").unwrap();

        let store = StoreHandle::at_path(&path);
        assert!(store.user().is_none());
        store.set_user(&sample_user()).unwrap();

        let reopened = StoreHandle::at_path(&path);
        assert!(reopened.user().is_some());
    }
}
