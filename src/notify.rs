use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::AuthService;
use crate::data::DataService;
use crate::realtime::{Subscription, SubscriptionEvent};
use crate::AppResult;

const ALERT_TITLE: &str = "New Message on DealDone";
const ALERT_BODY_LIMIT: usize = 50;

/// Capability gate for desktop alerts, mirroring the tri-state permission
/// model of the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPermission {
    Default,
    Granted,
    Denied,
}

/// The notification-bell anchor. Rendering replaces any existing badge;
/// `None` removes it.
pub trait BadgeHost: Send + Sync {
    fn render(&self, label: Option<&str>);
}

pub trait AlertSink: Send + Sync {
    fn permission(&self) -> AlertPermission;
    fn request_permission(&self);
    fn show(&self, title: &str, body: &str);
}

/// Badge text for an unread count: nothing at zero, the literal number up
/// to nine, "9+" beyond.
pub fn badge_label(count: u64) -> Option<String> {
    match count {
        0 => None,
        1..=9 => Some(count.to_string()),
        _ => Some("9+".to_string()),
    }
}

fn alert_body(content: &str) -> String {
    let truncated: String = content.chars().take(ALERT_BODY_LIMIT).collect();
    if truncated.len() < content.len() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Subscribed,
    TornDown,
}

/// Per-page notification pipeline: fetch the unread count, keep the badge
/// current, and surface an alert per inbound message while subscribed.
pub struct NotificationCenter {
    auth: AuthService,
    data: DataService,
    badge: Arc<dyn BadgeHost>,
    alerts: Arc<dyn AlertSink>,
    state: Mutex<PipelineState>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationCenter {
    pub(crate) fn new(
        auth: AuthService,
        data: DataService,
        badge: Arc<dyn BadgeHost>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        NotificationCenter {
            auth,
            data,
            badge,
            alerts,
            state: Mutex::new(PipelineState::Idle),
            consumer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Idle → Subscribed. Without a signed-in user the pipeline stays Idle;
    /// without a real-time channel the badge still renders once.
    pub async fn start(&self) -> AppResult<PipelineState> {
        if self.state() != PipelineState::Idle {
            return Ok(self.state());
        }

        let user = match self.auth.current_user() {
            Some(user) => user,
            None => {
                info!(target: "dealdone", event = "notify_idle_no_user");
                return Ok(PipelineState::Idle);
            }
        };

        self.update_badge().await?;

        let subscription = self.data.subscribe_messages(&user.id).await?;
        match subscription {
            Some(subscription) => {
                let handle = self.spawn_consumer(user.id.clone(), subscription);
                *self.consumer.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                info!(target: "dealdone", event = "notify_subscribed", user_id = %user.id);
            }
            None => {
                info!(target: "dealdone", event = "notify_no_realtime", user_id = %user.id);
            }
        }

        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = PipelineState::Subscribed;
        Ok(PipelineState::Subscribed)
    }

    /// Re-fetches the unread count and re-renders the badge for the current
    /// user. A signed-out pipeline leaves the badge untouched.
    pub async fn update_badge(&self) -> AppResult<()> {
        let user = match self.auth.current_user() {
            Some(user) => user,
            None => return Ok(()),
        };
        refresh_badge(&self.data, &self.badge, &user.id).await
    }

    /// One-shot permission request; only acts while the gate is undecided.
    pub fn request_permission(&self) {
        if self.alerts.permission() == AlertPermission::Default {
            self.alerts.request_permission();
        }
    }

    /// Subscribed → TornDown. Releases the channel exactly once; safe to
    /// call again or without a live channel.
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .consumer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
            info!(target: "dealdone", event = "notify_unsubscribed");
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = PipelineState::TornDown;
    }

    fn spawn_consumer(&self, user_id: String, mut subscription: Subscription) -> JoinHandle<()> {
        let data = self.data.clone();
        let badge = self.badge.clone();
        let alerts = self.alerts.clone();

        tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                match event {
                    SubscriptionEvent::Insert(message) => {
                        if let Err(err) = refresh_badge(&data, &badge, &user_id).await {
                            warn!(
                                target: "dealdone",
                                event = "notify_badge_refresh_failed",
                                error = %err
                            );
                        }
                        if alerts.permission() == AlertPermission::Granted {
                            alerts.show(ALERT_TITLE, &alert_body(&message.content));
                        }
                    }
                    SubscriptionEvent::Error(reason) => {
                        warn!(
                            target: "dealdone",
                            event = "notify_channel_error",
                            reason = %reason
                        );
                    }
                    SubscriptionEvent::Closed => break,
                }
            }
        })
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        if let Some(handle) = self
            .consumer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

async fn refresh_badge(
    data: &DataService,
    badge: &Arc<dyn BadgeHost>,
    user_id: &str,
) -> AppResult<()> {
    let count = data.unread_count(user_id).await?;
    badge.render(badge_label(count).as_deref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::model::Message;
    use crate::realtime::Subscription;
    use crate::store::StoreHandle;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingBadge {
        labels: Mutex<Vec<Option<String>>>,
    }

    impl BadgeHost for RecordingBadge {
        fn render(&self, label: Option<&str>) {
            self.labels
                .lock()
                .unwrap()
                .push(label.map(str::to_owned));
        }
    }

    struct RecordingAlerts {
        permission: AlertPermission,
        shown: Mutex<Vec<(String, String)>>,
        requested: Mutex<u32>,
    }

    impl RecordingAlerts {
        fn with_permission(permission: AlertPermission) -> Self {
            RecordingAlerts {
                permission,
                shown: Mutex::new(Vec::new()),
                requested: Mutex::new(0),
            }
        }
    }

    impl AlertSink for RecordingAlerts {
        fn permission(&self) -> AlertPermission {
            self.permission
        }

        fn request_permission(&self) {
            *self.requested.lock().unwrap() += 1;
        }

        fn show(&self, title: &str, body: &str) {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }

    fn build_center(
        permission: AlertPermission,
    ) -> (NotificationCenter, Arc<RecordingBadge>, Arc<RecordingAlerts>) {
        let store = StoreHandle::in_memory();
        let backend = Arc::new(MockBackend::new(store.clone()));
        let badge = Arc::new(RecordingBadge::default());
        let alerts = Arc::new(RecordingAlerts::with_permission(permission));
        let center = NotificationCenter::new(
            AuthService::new(backend.clone(), store.clone()),
            DataService::new(backend),
            badge.clone(),
            alerts.clone(),
        );
        (center, badge, alerts)
    }

    fn inbound(content: &str) -> Message {
        Message {
            id: "m1".into(),
            sender_id: "u2".into(),
            receiver_id: "u1".into(),
            content: content.into(),
            is_read: false,
            created_at: 1,
        }
    }

    async fn settle<F: Fn() -> bool>(done: F) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn badge_label_caps_at_nine() {
        assert_eq!(badge_label(0), None);
        assert_eq!(badge_label(5).as_deref(), Some("5"));
        assert_eq!(badge_label(9).as_deref(), Some("9"));
        assert_eq!(badge_label(15).as_deref(), Some("9+"));
    }

    #[test]
    fn alert_body_truncates_long_content() {
        let short = alert_body("hello");
        assert_eq!(short, "hello");

        let long = "x".repeat(80);
        let body = alert_body(&long);
        assert_eq!(body.chars().count(), ALERT_BODY_LIMIT + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn alert_body_respects_char_boundaries() {
        let content = "é".repeat(60);
        let body = alert_body(&content);
        assert!(body.starts_with('é'));
        assert!(body.ends_with("..."));
    }

    #[tokio::test]
    async fn insert_events_refresh_badge_and_alert() {
        let (center, badge, alerts) = build_center(AlertPermission::Granted);
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(rx, tokio::spawn(async {}));

        let handle = center.spawn_consumer("u1".into(), subscription);

        tx.send(SubscriptionEvent::Insert(inbound("hello there")))
            .unwrap();
        settle(|| !alerts.shown.lock().unwrap().is_empty()).await;

        let shown = alerts.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, ALERT_TITLE);
        assert_eq!(shown[0].1, "hello there");
        assert!(!badge.labels.lock().unwrap().is_empty());

        drop(shown);
        tx.send(SubscriptionEvent::Closed).unwrap();
        settle(|| handle.is_finished()).await;
    }

    #[tokio::test]
    async fn denied_permission_suppresses_alerts() {
        let (center, badge, alerts) = build_center(AlertPermission::Denied);
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(rx, tokio::spawn(async {}));
        let _handle = center.spawn_consumer("u1".into(), subscription);

        tx.send(SubscriptionEvent::Insert(inbound("quiet"))).unwrap();
        settle(|| !badge.labels.lock().unwrap().is_empty()).await;

        assert!(alerts.shown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_permission_only_fires_when_undecided() {
        let (center, _badge, alerts) = build_center(AlertPermission::Default);
        center.request_permission();
        center.request_permission();
        assert_eq!(*alerts.requested.lock().unwrap(), 2);

        let (center, _badge, alerts) = build_center(AlertPermission::Granted);
        center.request_permission();
        assert_eq!(*alerts.requested.lock().unwrap(), 0);
    }
}
