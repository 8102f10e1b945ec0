use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::backend::{Backend, BackendKind};
use crate::config::BackendConfig;
use crate::model::{
    Business, BusinessInput, Message, MessageDraft, Profile, User, UserMetadata,
};
use crate::realtime::{open_message_channel, Subscription};
use crate::{AppError, AppResult};

const APIKEY_HEADER: &str = "apikey";
const PREFER_HEADER: &str = "Prefer";

/// Live backing over the hosted auth, table and realtime endpoints.
pub struct RemoteBackend {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl RemoteBackend {
    pub fn new(config: BackendConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(AppError::from)?;
        Ok(RemoteBackend {
            http,
            base: config.url,
            anon_key: config.anon_key,
            access_token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base.join(path).map_err(|e| {
            AppError::new("CONFIG/INVALID_URL", "Endpoint path did not resolve")
                .with_context("path", path.to_string())
                .with_context("error", e.to_string())
        })
    }

    fn rest(&self, table: &str) -> AppResult<Url> {
        self.endpoint(&format!("/rest/v1/{table}"))
    }

    async fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert(APIKEY_HEADER, value);
        }
        let token = self.access_token.read().await;
        let bearer = token.as_deref().unwrap_or(&self.anon_key);
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> AppResult<Vec<T>> {
        let response = self
            .http
            .get(self.rest(table)?)
            .headers(self.headers().await)
            .query(query)
            .send()
            .await
            .map_err(AppError::from)?;
        let response = expect_success(response).await?;
        response.json().await.map_err(AppError::from)
    }

    /// Auth responses either wrap the user in a session envelope or return
    /// it bare; both carry the identity, only the envelope carries a token.
    async fn session_from(&self, value: Value) -> AppResult<User> {
        if let Some(token) = value.get("access_token").and_then(Value::as_str) {
            *self.access_token.write().await = Some(token.to_string());
        }
        let user_value = match value.get("user") {
            Some(user) => user.clone(),
            None => value,
        };
        serde_json::from_value(user_value).map_err(|e| {
            AppError::from(e).with_context("operation", "parse_session_user")
        })
    }

    /// The `profiles` row must exist before a business can reference it.
    /// The insert is idempotent, so racing callers cannot duplicate it, and
    /// a failure here aborts the save before any business row is written.
    async fn ensure_profile(&self, owner_id: &str) -> AppResult<()> {
        let profile = match self.fetch_user().await? {
            Some(user) if user.id == owner_id => Profile::for_user(&user),
            _ => Profile {
                id: owner_id.to_string(),
                full_name: None,
                user_type: Default::default(),
            },
        };

        let response = self
            .http
            .post(self.rest("profiles")?)
            .headers(self.headers().await)
            .query(&[("on_conflict", "id")])
            .header(PREFER_HEADER, "resolution=ignore-duplicates")
            .json(&profile)
            .send()
            .await
            .map_err(AppError::from)?;
        expect_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> AppResult<User> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/signup")?)
            .headers(self.headers().await)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .map_err(AppError::from)?;
        let response = expect_success(response).await?;
        let value: Value = response.json().await.map_err(AppError::from)?;
        let user = self.session_from(value).await?;
        info!(target: "dealdone", event = "sign_up", user_id = %user.id);
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<User> {
        let response = self
            .http
            .post(self.endpoint("/auth/v1/token")?)
            .headers(self.headers().await)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(AppError::from)?;
        let response = expect_success(response).await?;
        let value: Value = response.json().await.map_err(AppError::from)?;
        let user = self.session_from(value).await?;
        info!(target: "dealdone", event = "sign_in", user_id = %user.id);
        Ok(user)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let had_session = self.access_token.read().await.is_some();
        if had_session {
            let response = self
                .http
                .post(self.endpoint("/auth/v1/logout")?)
                .headers(self.headers().await)
                .send()
                .await
                .map_err(AppError::from)?;
            expect_success(response).await?;
        }
        *self.access_token.write().await = None;
        info!(target: "dealdone", event = "sign_out");
        Ok(())
    }

    async fn fetch_user(&self) -> AppResult<Option<User>> {
        if self.access_token.read().await.is_none() {
            return Ok(None);
        }
        let response = self
            .http
            .get(self.endpoint("/auth/v1/user")?)
            .headers(self.headers().await)
            .send()
            .await
            .map_err(AppError::from)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // The stored token no longer maps to a session.
            *self.access_token.write().await = None;
            return Ok(None);
        }
        let response = expect_success(response).await?;
        let user: User = response.json().await.map_err(AppError::from)?;
        Ok(Some(user))
    }

    async fn businesses(&self) -> AppResult<Vec<Business>> {
        self.rows(
            "businesses",
            &[("select", "*"), ("order", "created_at.asc")],
        )
        .await
    }

    async fn business_by_owner(&self, owner_id: &str) -> AppResult<Option<Business>> {
        let filter = format!("eq.{owner_id}");
        let mut rows: Vec<Business> = self
            .rows(
                "businesses",
                &[("select", "*"), ("owner_id", &filter), ("limit", "1")],
            )
            .await?;
        Ok(rows.pop())
    }

    async fn save_business(&self, input: BusinessInput) -> AppResult<Business> {
        self.ensure_profile(&input.owner_id).await?;

        // Timestamp columns take RFC 3339 on the wire.
        let now = Utc::now().to_rfc3339();
        let existing = self.business_by_owner(&input.owner_id).await?;

        let response = match existing {
            Some(current) => {
                // Update in place, preserving id, created_at and is_active.
                let filter = format!("eq.{}", current.id);
                self.http
                    .patch(self.rest("businesses")?)
                    .headers(self.headers().await)
                    .query(&[("id", filter.as_str())])
                    .header(PREFER_HEADER, "return=representation")
                    .json(&json!({
                        "name": input.name,
                        "industry": input.industry,
                        "revenue": input.revenue,
                        "valuation": input.valuation,
                        "description": input.description,
                        "updated_at": now,
                    }))
                    .send()
                    .await
                    .map_err(AppError::from)?
            }
            None => {
                // Conflict-safe insert: a concurrent save for the same owner
                // merges instead of duplicating the row.
                self.http
                    .post(self.rest("businesses")?)
                    .headers(self.headers().await)
                    .query(&[("on_conflict", "owner_id")])
                    .header(
                        PREFER_HEADER,
                        "resolution=merge-duplicates,return=representation",
                    )
                    .json(&json!({
                        "owner_id": input.owner_id,
                        "name": input.name,
                        "industry": input.industry,
                        "revenue": input.revenue,
                        "valuation": input.valuation,
                        "description": input.description,
                        "is_active": true,
                        "updated_at": now,
                    }))
                    .send()
                    .await
                    .map_err(AppError::from)?
            }
        };

        let response = expect_success(response).await?;
        let mut rows: Vec<Business> = response.json().await.map_err(AppError::from)?;
        rows.pop().ok_or_else(|| {
            AppError::new("DATA/EMPTY_REPRESENTATION", "Save returned no row")
                .with_context("table", "businesses")
        })
    }

    async fn messages_for(&self, user_id: &str) -> AppResult<Vec<Message>> {
        let either = format!("(sender_id.eq.{user_id},receiver_id.eq.{user_id})");
        self.rows(
            "messages",
            &[
                ("select", "*"),
                ("or", &either),
                ("order", "created_at.asc"),
            ],
        )
        .await
    }

    async fn send_message(&self, draft: MessageDraft) -> AppResult<Message> {
        let response = self
            .http
            .post(self.rest("messages")?)
            .headers(self.headers().await)
            .header(PREFER_HEADER, "return=representation")
            .json(&json!({
                "sender_id": draft.sender_id,
                "receiver_id": draft.receiver_id,
                "content": draft.content,
                "is_read": false,
            }))
            .send()
            .await
            .map_err(AppError::from)?;
        let response = expect_success(response).await?;
        let mut rows: Vec<Message> = response.json().await.map_err(AppError::from)?;
        rows.pop().ok_or_else(|| {
            AppError::new("DATA/EMPTY_REPRESENTATION", "Insert returned no row")
                .with_context("table", "messages")
        })
    }

    async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        let filter = format!("eq.{user_id}");
        let response = self
            .http
            .head(self.rest("messages")?)
            .headers(self.headers().await)
            .query(&[
                ("select", "id"),
                ("receiver_id", filter.as_str()),
                ("is_read", "eq.false"),
            ])
            .header(PREFER_HEADER, "count=exact")
            .send()
            .await
            .map_err(AppError::from)?;
        let response = expect_success(response).await?;
        parse_content_range(&response)
    }

    async fn mark_as_read(&self, ids: &[String]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let filter = format!("in.({})", ids.join(","));
        let response = self
            .http
            .patch(self.rest("messages")?)
            .headers(self.headers().await)
            .query(&[("id", filter.as_str())])
            .json(&json!({ "is_read": true }))
            .send()
            .await
            .map_err(AppError::from)?;
        expect_success(response).await?;
        Ok(())
    }

    async fn subscribe_messages(&self, user_id: &str) -> AppResult<Option<Subscription>> {
        let mut ws_url = self.endpoint("/realtime/v1/websocket")?;
        let scheme = if ws_url.scheme() == "http" { "ws" } else { "wss" };
        ws_url
            .set_scheme(scheme)
            .map_err(|_| AppError::new("CONFIG/INVALID_URL", "Backend URL has no ws form"))?;
        ws_url
            .query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");

        debug!(target: "dealdone", event = "realtime_connect", user_id);
        Ok(Some(open_message_channel(ws_url, user_id)))
    }
}

async fn expect_success(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(
        AppError::new(format!("HTTP/{}", status.as_u16()), message_from_body(&body))
            .with_context("path", url),
    )
}

/// Hosted error bodies carry `message` or `error_description`; fall back to
/// a bounded slice of the raw body.
fn message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error_description", "msg", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    let mut preview: String = body.chars().take(160).collect();
    if preview.is_empty() {
        preview = "Request failed".to_string();
    }
    preview
}

fn parse_content_range(response: &Response) -> AppResult<u64> {
    let raw = response
        .headers()
        .get("content-range")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::new("HTTP/NO_COUNT", "Count response missing content-range"))?;
    let total = raw.rsplit('/').next().unwrap_or("");
    if total == "*" {
        return Ok(0);
    }
    total.parse::<u64>().map_err(|_| {
        AppError::new("HTTP/BAD_COUNT", "Count header did not parse")
            .with_context("content_range", raw.to_string())
    })
}
