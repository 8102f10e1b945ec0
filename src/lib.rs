//! Client-side glue for the DealDone marketplace: a data-access/auth facade
//! over a hosted backend with a local-storage fallback, and a notification
//! pipeline fed by a real-time message channel.

mod auth;
mod backend;
mod client;
mod config;
mod data;
mod error;
mod id;
mod logging;
mod model;
mod notify;
mod realtime;
mod store;
mod time;

pub use auth::AuthService;
pub use backend::BackendKind;
pub use client::DealDone;
pub use config::{configure, BackendConfig, ConfigError, ANON_KEY_KEY, URL_KEY};
pub use data::DataService;
pub use error::{AppError, AppResult};
pub use logging::init as init_logging;
pub use model::{
    Business, BusinessInput, Message, MessageDraft, Profile, User, UserMetadata, UserRole,
};
pub use notify::{
    badge_label, AlertPermission, AlertSink, BadgeHost, NotificationCenter, PipelineState,
};
pub use realtime::{Subscription, SubscriptionEvent};
pub use store::{StoreHandle, BUSINESSES_KEY, MESSAGES_KEY, USER_KEY};
