//! WebSocket audio bridge
//!
//! A live interview talks to its respondent through a [`WebSocketChannel`]:
//! agent clips go out as base64 JSON, respondent utterances come in as
//! binary frames or `{"type":"audio","data":...}` messages. The channel
//! exists from the moment the interview starts, so clips played before the
//! respondent connects are buffered until the socket attaches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use interview_agent_core::{AudioChannel, AudioClip, AudioEncoding, Error, Result};

use crate::state::AppState;
use crate::ServerError;

/// Agent clips buffered while no respondent is attached
const OUTBOUND_BUFFER: usize = 64;
/// Respondent utterances waiting for the orchestrator
const INBOUND_BUFFER: usize = 16;

/// WebSocket message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Respondent audio (base64 encoded)
    Audio {
        data: String,
        #[serde(default)]
        encoding: AudioEncoding,
    },
    /// Agent audio (base64 encoded) with the words it says
    AgentAudio {
        data: String,
        encoding: AudioEncoding,
        sample_rate: u32,
        text: String,
    },
    /// Sent once the socket attaches
    SessionInfo { interview_id: String },
    Error { message: String },
    Ping,
    Pong,
    /// Either side ends the call
    EndSession,
}

impl WsMessage {
    fn to_frame(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode WebSocket message");
                None
            }
        }
    }
}

/// Audio channel backed by a respondent's WebSocket
pub struct WebSocketChannel {
    interview_id: String,
    inbound_tx: mpsc::Sender<AudioClip>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<AudioClip>>,
    outbound_tx: mpsc::Sender<WsMessage>,
    outbound_rx: parking_lot::Mutex<Option<mpsc::Receiver<WsMessage>>>,
    closed: AtomicBool,
}

impl WebSocketChannel {
    pub fn new(interview_id: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        Self {
            interview_id: interview_id.into(),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: parking_lot::Mutex::new(Some(outbound_rx)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn interview_id(&self) -> &str {
        &self.interview_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Takes the outbound stream; only the first socket gets it
    pub fn attach(&self) -> Option<mpsc::Receiver<WsMessage>> {
        self.outbound_rx.lock().take()
    }

    /// Hands a respondent utterance to the orchestrator
    pub fn deliver(&self, clip: AudioClip) -> std::result::Result<(), ServerError> {
        if clip.is_empty() {
            return Ok(());
        }
        self.inbound_tx.try_send(clip).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ServerError::Unavailable("respondent audio backlog full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                ServerError::Conflict("interview no longer listening".to_string())
            }
        })
    }

    fn send(&self, message: WsMessage) -> Result<()> {
        self.outbound_tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Audio("outbound audio buffer full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Audio("respondent disconnected".to_string())
            }
        })
    }
}

#[async_trait]
impl AudioChannel for WebSocketChannel {
    async fn play(&self, clip: AudioClip, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Audio("channel closed".to_string()));
        }
        self.send(WsMessage::AgentAudio {
            data: BASE64.encode(&clip.data[..]),
            encoding: clip.encoding,
            sample_rate: clip.sample_rate,
            text: text.to_string(),
        })
    }

    async fn capture(&self, timeout: Duration) -> Result<Option<AudioClip>> {
        if self.is_closed() {
            return Err(Error::Audio("channel closed".to_string()));
        }
        let mut inbound = self.inbound_rx.lock().await;
        match tokio::time::timeout(timeout, inbound.recv()).await {
            Ok(Some(clip)) => Ok(Some(clip)),
            Ok(None) => Err(Error::Audio("inbound audio stream ended".to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.send(WsMessage::EndSession);
        }
    }
}

/// Live channels keyed by interview id
#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<WebSocketChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, interview_id: &str) -> Arc<WebSocketChannel> {
        let channel = Arc::new(WebSocketChannel::new(interview_id));
        self.channels
            .write()
            .insert(interview_id.to_string(), Arc::clone(&channel));
        channel
    }

    pub fn get(&self, interview_id: &str) -> Option<Arc<WebSocketChannel>> {
        self.channels.read().get(interview_id).cloned()
    }

    pub fn remove(&self, interview_id: &str) -> Option<Arc<WebSocketChannel>> {
        self.channels.write().remove(interview_id)
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `GET /ws/interviews/:id`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> std::result::Result<Response, ServerError> {
    let channel = state.channels.get(&interview_id).ok_or_else(|| {
        ServerError::NotFound(format!("No live interview {}", interview_id))
    })?;
    let outbound = channel
        .attach()
        .ok_or_else(|| ServerError::Conflict("Respondent already connected".to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, channel, outbound, state)))
}

async fn handle_socket(
    socket: WebSocket,
    channel: Arc<WebSocketChannel>,
    mut outbound: mpsc::Receiver<WsMessage>,
    state: AppState,
) {
    let interview_id = channel.interview_id().to_string();
    tracing::info!(interview_id = %interview_id, "Respondent connected");

    let (mut sender, mut receiver) = socket.split();

    let info = WsMessage::SessionInfo {
        interview_id: interview_id.clone(),
    };
    if let Some(frame) = info.to_frame() {
        let _ = sender.send(frame).await;
    }

    let forward_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let last = message == WsMessage::EndSession;
            if let Some(frame) = message.to_frame() {
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
            if last {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                if let Err(e) = channel.deliver(AudioClip::pcm16(data)) {
                    tracing::warn!(interview_id = %interview_id, error = %e, "Dropped respondent audio");
                }
            }
            Ok(Message::Text(text)) => match serde_json::from_str::<WsMessage>(&text) {
                Ok(WsMessage::Audio { data, encoding }) => match BASE64.decode(&data) {
                    Ok(bytes) => {
                        let clip = AudioClip::new(bytes, encoding, 16_000);
                        if let Err(e) = channel.deliver(clip) {
                            tracing::warn!(interview_id = %interview_id, error = %e, "Dropped respondent audio");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to decode audio data");
                        let _ = channel.send(WsMessage::Error {
                            message: "audio data is not valid base64".to_string(),
                        });
                    }
                },
                Ok(WsMessage::Ping) => {
                    let _ = channel.send(WsMessage::Pong);
                }
                Ok(WsMessage::EndSession) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring unrecognised WebSocket message");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(interview_id = %interview_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    if !channel.is_closed() {
        tracing::info!(interview_id = %interview_id, "Respondent hung up");
        state
            .orchestrator
            .state_manager()
            .request_termination(&interview_id, "respondent disconnected");
    }
    forward_task.abort();
    tracing::info!(interview_id = %interview_id, "WebSocket closed");
}
