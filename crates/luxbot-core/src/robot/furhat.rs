//! Furhat Realtime API client (`ws://<host>:<port>/v1/events`).
//!
//! Every message is a JSON object with a `type` field. Requests go out through a
//! writer task; a reader task turns incoming events into [`RobotEvent`]s on an mpsc
//! channel and emits [`RobotEvent::Disconnected`] once when the socket goes away.

use super::{Gesture, ListenOptions, RobotEvent, RobotPlatform};
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

enum Outgoing {
    Text(String),
    Close,
}

pub struct FurhatClient {
    outgoing: mpsc::Sender<Outgoing>,
}

impl FurhatClient {
    /// Connect and authenticate (when a key is given). Events arrive on the returned receiver.
    pub async fn connect(
        host: &str,
        port: u16,
        auth_key: Option<&str>,
    ) -> CoreResult<(Self, mpsc::Receiver<RobotEvent>)> {
        let url = format!("ws://{}:{}/v1/events", host, port);
        info!("🤖 Connecting to robot at {}", url);

        let (stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| CoreError::Robot(format!("connect to {} failed: {}", url, e)))?;
        let (mut ws_write, mut ws_read) = stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Outgoing>(EVENT_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RobotEvent>(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                match msg {
                    Outgoing::Text(text) => {
                        if let Err(e) = ws_write.send(WsMessage::Text(text)).await {
                            warn!("Robot send failed: {}", e);
                            break;
                        }
                    }
                    Outgoing::Close => {
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        let event = parse_event(&text);
                        debug!("Robot event: {:?}", event);
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Robot connection error: {}", e);
                        break;
                    }
                }
            }
            let _ = event_tx.send(RobotEvent::Disconnected).await;
        });

        let client = Self { outgoing: out_tx };
        if let Some(key) = auth_key.filter(|k| !k.is_empty()) {
            client.send(auth_request(key)).await?;
        }
        info!("✅ Robot connected");
        Ok((client, event_rx))
    }

    async fn send(&self, request: Value) -> CoreResult<()> {
        self.outgoing
            .send(Outgoing::Text(request.to_string()))
            .await
            .map_err(|_| CoreError::Robot("robot connection closed".to_string()))
    }
}

#[async_trait]
impl RobotPlatform for FurhatClient {
    async fn attend_user(&self) -> CoreResult<()> {
        self.send(json!({ "type": "request.attend.user", "target": "closest" }))
            .await
    }

    async fn speak_text(&self, text: &str) -> CoreResult<()> {
        self.send(json!({ "type": "request.speak.text", "text": text, "abort": false }))
            .await
    }

    async fn speak_audio(&self, url: &str, abort: bool) -> CoreResult<()> {
        self.send(json!({ "type": "request.speak.audio", "url": url, "abort": abort }))
            .await
    }

    async fn start_listening(&self, options: &ListenOptions) -> CoreResult<()> {
        self.send(listen_start_request(options)).await
    }

    async fn stop_listening(&self) -> CoreResult<()> {
        self.send(json!({ "type": "request.listen.stop" })).await
    }

    async fn gesture(&self, gesture: &Gesture) -> CoreResult<()> {
        self.send(gesture_request(gesture)).await
    }

    async fn disconnect(&self) -> CoreResult<()> {
        self.outgoing
            .send(Outgoing::Close)
            .await
            .map_err(|_| CoreError::Robot("robot connection already closed".to_string()))
    }
}

fn auth_request(key: &str) -> Value {
    json!({ "type": "request.auth", "key": key })
}

fn listen_start_request(options: &ListenOptions) -> Value {
    json!({
        "type": "request.listen.start",
        "partial": options.partial,
        "concat": options.concat,
        "stop_user_end": options.stop_user_end,
        "stop_robot_start": options.stop_robot_start,
        "stop_no_speech": options.stop_no_speech,
        "end_speech_timeout": options.end_speech_timeout,
    })
}

fn gesture_request(gesture: &Gesture) -> Value {
    json!({
        "type": "request.gesture.start",
        "name": gesture.name,
        "intensity": gesture.intensity,
        "duration": gesture.duration,
    })
}

/// Map one incoming message to an event. Unknown or unparsable messages become `Other`.
pub fn parse_event(raw: &str) -> RobotEvent {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return RobotEvent::Other(raw.to_string());
    };
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "response.listen.start" => RobotEvent::ListenStart,
        "response.hear.start" => RobotEvent::HearStart,
        "response.hear.end" => RobotEvent::HearEnd {
            text: value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        "response.speak.end" => RobotEvent::SpeakEnd,
        other => RobotEvent::Other(other.to_string()),
    }
}
