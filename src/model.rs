use serde::{Deserialize, Serialize};

use crate::time::epoch_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Owner,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "type", default)]
    pub role: UserRole,
}

/// The current signed-in identity. Exactly one is resolvable at a time; in
/// mock mode it lives under the `dealDoneUser` store key, in remote mode the
/// store copy is a cache of the hosted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(rename = "user_metadata", default)]
    pub metadata: UserMetadata,
}

/// A marketplace listing. At most one exists per owner; saves are upserts
/// keyed by `owner_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue: i64,
    #[serde(default)]
    pub valuation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(with = "epoch_ms", default)]
    pub created_at: i64,
    #[serde(with = "epoch_ms", default)]
    pub updated_at: i64,
}

fn default_active() -> bool {
    true
}

/// Caller-supplied business payload; id and timestamps are assigned by the
/// backing store on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessInput {
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue: i64,
    #[serde(default)]
    pub valuation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(with = "epoch_ms", default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

/// Remote-only mirror of the user identity in the relational store. Created
/// lazily before the first business save so the `businesses.owner_id`
/// relationship resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub user_type: UserRole,
}

impl Profile {
    pub fn for_user(user: &User) -> Self {
        Profile {
            id: user.id.clone(),
            full_name: user.metadata.full_name.clone(),
            user_type: user.metadata.role,
        }
    }
}
