use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use url::Url;

use crate::model::Message;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TOPIC: &str = "phoenix";

/// Events delivered by a message subscription. Errors and channel closure
/// are explicit so the consumer can report or reconnect instead of silently
/// losing the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Insert(Message),
    Error(String),
    Closed,
}

/// A cancellable handle over the server-push channel. Dropping it releases
/// the channel task; `cancel` additionally guarantees no further delivery.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
    task: JoinHandle<()>,
    cancelled: bool,
}

impl Subscription {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Subscription {
            rx,
            task,
            cancelled: false,
        }
    }

    /// Next event from the channel; `None` once the subscription is
    /// cancelled or the channel task has gone away.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Releases the channel. Idempotent; events received after this point
    /// are never delivered.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.task.abort();
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    topic: &'a str,
    event: &'a str,
    payload: Value,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Deserialize)]
struct InboundFrame {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

fn message_topic(user_id: &str) -> String {
    format!("realtime:public:messages:receiver_id=eq.{user_id}")
}

/// Pulls the inserted row out of an INSERT frame. Hosted realtime payloads
/// carry the row under `record`; older deployments used `new`.
fn decode_insert(frame: &InboundFrame) -> Option<Message> {
    if frame.event != "INSERT" {
        return None;
    }
    let row = frame
        .payload
        .get("record")
        .or_else(|| frame.payload.get("new"))?;
    match serde_json::from_value::<Message>(row.clone()) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(
                target: "dealdone",
                event = "realtime_decode_failed",
                topic = %frame.topic,
                error = %err
            );
            None
        }
    }
}

/// Opens the websocket channel for inserts addressed to `user_id` and
/// returns the subscription handle. The channel task joins the filtered
/// topic, answers heartbeats, and forwards decoded rows until cancelled.
pub(crate) fn open_message_channel(ws_url: Url, user_id: &str) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let topic = message_topic(user_id);

    let task = tokio::spawn(async move {
        let (ws, _) = match connect_async(ws_url.as_str()).await {
            Ok(pair) => pair,
            Err(err) => {
                let _ = tx.send(SubscriptionEvent::Error(err.to_string()));
                let _ = tx.send(SubscriptionEvent::Closed);
                return;
            }
        };
        let (mut sink, mut stream) = ws.split();

        let join = OutboundFrame {
            topic: &topic,
            event: "phx_join",
            payload: json!({}),
            reference: "1".to_string(),
        };
        if let Err(err) = send_frame(&mut sink, &join).await {
            let _ = tx.send(SubscriptionEvent::Error(err));
            let _ = tx.send(SubscriptionEvent::Closed);
            return;
        }
        debug!(target: "dealdone", event = "realtime_joined", topic = %topic);

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // first tick fires immediately
        let mut heartbeat_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let frame = OutboundFrame {
                        topic: HEARTBEAT_TOPIC,
                        event: "heartbeat",
                        payload: json!({}),
                        reference: heartbeat_ref.to_string(),
                    };
                    heartbeat_ref += 1;
                    if let Err(err) = send_frame(&mut sink, &frame).await {
                        let _ = tx.send(SubscriptionEvent::Error(err));
                        break;
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(raw))) => {
                            let frame: InboundFrame = match serde_json::from_str(&raw) {
                                Ok(frame) => frame,
                                Err(err) => {
                                    warn!(
                                        target: "dealdone",
                                        event = "realtime_frame_unreadable",
                                        error = %err
                                    );
                                    continue;
                                }
                            };
                            if frame.topic != topic {
                                continue;
                            }
                            if let Some(message) = decode_insert(&frame) {
                                if tx.send(SubscriptionEvent::Insert(message)).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            let _ = tx.send(SubscriptionEvent::Error(err.to_string()));
                            break;
                        }
                    }
                }
            }
        }
        let _ = tx.send(SubscriptionEvent::Closed);
    });

    Subscription::new(rx, task)
}

async fn send_frame<S>(sink: &mut S, frame: &OutboundFrame<'_>) -> Result<(), String>
where
    S: SinkExt<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let raw = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    sink.send(WsMessage::Text(raw))
        .await
        .map_err(|e| e.to_string())
}
