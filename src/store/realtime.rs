//! Realtime channel task: Phoenix framing over a websocket, scoped to the
//! INSERT events of one room.
//!
//! The task joins `realtime:room:<room>` with a `postgres_changes` binding
//! filtered by room equality, so scoping happens server-side. Everything it
//! learns goes out as [`SubscriptionEvent`]s; it never touches shared state.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::common::ChatMessage;

use super::{StoreError, SubscriptionEvent};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
// The backend API has no handshake timeout of its own; without this a dead
// endpoint would leave the channel silently stuck in "joining".
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";

/// Wire frame of the Phoenix channel protocol.
#[derive(Debug, Serialize, Deserialize)]
struct PhoenixFrame {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

pub(super) fn websocket_url(base_url: &str, anon_key: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("wss://{base_url}")
    };
    format!("{ws_base}/realtime/v1/websocket?apikey={anon_key}&vsn=1.0.0")
}

fn channel_topic(room: &str) -> String {
    format!("realtime:room:{room}")
}

fn join_frame(room: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: channel_topic(room),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "postgres_changes": [{
                    "event": "INSERT",
                    "schema": "public",
                    "table": "messages",
                    "filter": format!("room=eq.{room}"),
                }],
            },
        }),
        reference: Some(JOIN_REF.to_string()),
    }
}

fn heartbeat_frame(counter: u64) -> PhoenixFrame {
    PhoenixFrame {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(counter.to_string()),
    }
}

/// Runs one channel until the socket dies or the subscription handle aborts
/// the task.
pub(super) async fn run_channel(
    url: String,
    room: String,
    events: mpsc::Sender<SubscriptionEvent>,
) {
    let (socket, _) = match connect_async(url.as_str()).await {
        Ok(pair) => pair,
        Err(err) => {
            let _ = events
                .send(SubscriptionEvent::Lost(StoreError::Unavailable(err.to_string())))
                .await;
            return;
        }
    };

    let (mut write, mut read) = socket.split();

    if let Err(err) = send_frame(&mut write, &join_frame(&room)).await {
        let _ = events.send(SubscriptionEvent::Lost(err)).await;
        return;
    }

    let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // consume the immediate first tick
    let mut heartbeat_ref: u64 = 2; // ref 1 is the join
    let join_deadline = Instant::now() + JOIN_TIMEOUT;
    let mut joined = false;

    loop {
        tokio::select! {
            _ = time::sleep_until(join_deadline), if !joined => {
                let _ = events
                    .send(SubscriptionEvent::Lost(StoreError::Unavailable(
                        "timed out waiting for channel join".to_string(),
                    )))
                    .await;
                return;
            }
            _ = heartbeat.tick() => {
                if let Err(err) = send_frame(&mut write, &heartbeat_frame(heartbeat_ref)).await {
                    let _ = events.send(SubscriptionEvent::Lost(err)).await;
                    return;
                }
                heartbeat_ref += 1;
            }
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_frame(text.as_str(), &room) {
                        if matches!(event, SubscriptionEvent::Joined) {
                            joined = true;
                        }
                        let lost = matches!(event, SubscriptionEvent::Lost(_));
                        if events.send(event).await.is_err() || lost {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events
                        .send(SubscriptionEvent::Lost(StoreError::Unavailable(
                            "websocket closed".to_string(),
                        )))
                        .await;
                    return;
                }
                Some(Err(err)) => {
                    let _ = events
                        .send(SubscriptionEvent::Lost(StoreError::Unavailable(err.to_string())))
                        .await;
                    return;
                }
            }
        }
    }
}

async fn send_frame<S>(write: &mut S, frame: &PhoenixFrame) -> Result<(), StoreError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(frame).map_err(|err| StoreError::Decode(err.to_string()))?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|err| StoreError::Unavailable(err.to_string()))
}

/// Decode one inbound frame into a subscription event, if it carries one.
/// Frames for other topics and protocol chatter are ignored.
fn decode_frame(raw: &str, room: &str) -> Option<SubscriptionEvent> {
    let frame: PhoenixFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(err) => {
            log::debug!("Ignoring unparseable realtime frame: {err}");
            return None;
        }
    };

    if frame.topic != channel_topic(room) {
        return None;
    }

    match frame.event.as_str() {
        "phx_reply" if frame.reference.as_deref() == Some(JOIN_REF) => {
            if frame.payload.get("status").and_then(Value::as_str) == Some("ok") {
                Some(SubscriptionEvent::Joined)
            } else {
                Some(SubscriptionEvent::Lost(StoreError::Unavailable(format!(
                    "channel join refused: {}",
                    frame.payload
                ))))
            }
        }
        "postgres_changes" => match decode_insert(&frame.payload) {
            Ok(message) => Some(SubscriptionEvent::Insert(message)),
            Err(err) => {
                log::warn!("Dropping undecodable insert payload: {err}");
                None
            }
        },
        "phx_error" | "phx_close" => Some(SubscriptionEvent::Lost(StoreError::Unavailable(
            format!("channel closed by server ({})", frame.event),
        ))),
        _ => None,
    }
}

/// Pull the inserted row out of a `postgres_changes` payload.
fn decode_insert(payload: &Value) -> Result<ChatMessage, StoreError> {
    let record = payload
        .pointer("/data/record")
        .or_else(|| payload.get("record"))
        .ok_or_else(|| StoreError::Decode("payload carries no record".to_string()))?;
    serde_json::from_value(record.clone()).map_err(|err| StoreError::Decode(err.to_string()))
}
