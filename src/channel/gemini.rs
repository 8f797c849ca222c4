use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::messages::{LiveServerMessage, RealtimeInputMessage, SetupMessage};
use super::{ChannelEvent, ChannelHandle, LiveConnectConfig, RealtimeChannel, RealtimeConnector};
use crate::audio::WireBlob;

/// Gemini Live WebSocket endpoint
pub const GEMINI_LIVE_WS_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

const OUTBOUND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 256;

enum Outbound {
    Audio(WireBlob),
    Close,
}

/// Connects voice sessions to the Gemini Live API
pub struct GeminiLiveConnector {
    url: String,
    api_key: String,
}

impl GeminiLiveConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_url(GEMINI_LIVE_WS_URL, api_key)
    }

    pub fn with_url(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

struct GeminiLiveChannel {
    outbound: mpsc::Sender<Outbound>,
    closed: AtomicBool,
}

impl RealtimeChannel for GeminiLiveChannel {
    fn send_realtime_input(&self, blob: WireBlob) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.outbound.try_send(Outbound::Audio(blob)) {
            debug!("Dropping outbound audio frame: {}", e);
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Capacity may be exhausted by audio; a dropped sender also ends the writer
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let _ = outbound.send(Outbound::Close).await;
        });
    }
}

#[async_trait::async_trait]
impl RealtimeConnector for GeminiLiveConnector {
    async fn connect(&self, model: &str, config: &LiveConnectConfig) -> Result<ChannelHandle> {
        if self.api_key.is_empty() {
            anyhow::bail!("Gemini API key is not configured");
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

        let url = format!("{}?key={}", self.url, self.api_key);
        let setup = serde_json::to_string(&SetupMessage::new(model, config))?;

        info!("Connecting to Gemini Live (model={})", model);

        tokio::spawn(async move {
            if let Err(e) = run_connection(url, setup, outbound_rx, event_tx.clone()).await {
                error!("Gemini Live connection failed: {:#}", e);
                let _ = event_tx.send(ChannelEvent::Error(format!("{:#}", e))).await;
            }
        });

        Ok(ChannelHandle {
            channel: Arc::new(GeminiLiveChannel {
                outbound: outbound_tx,
                closed: AtomicBool::new(false),
            }),
            events: event_rx,
        })
    }
}

async fn run_connection(
    url: String,
    setup: String,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    event_tx: mpsc::Sender<ChannelEvent>,
) -> Result<()> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Gemini Live: {}", e))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    ws_tx
        .send(WsMessage::Text(setup.into()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send setup message: {}", e))?;

    let writer = tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            match outbound {
                Outbound::Audio(blob) => {
                    let payload = match serde_json::to_string(&RealtimeInputMessage::audio(blob)) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to serialize audio frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_tx.send(WsMessage::Text(payload.into())).await {
                        warn!("Failed to send audio frame: {}", e);
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }

        if let Err(e) = ws_tx.send(WsMessage::Close(None)).await {
            debug!("Close frame not delivered: {}", e);
        }
    });

    let mut opened = false;

    while let Some(frame) = ws_rx.next().await {
        let payload: Vec<u8> = match frame {
            Ok(WsMessage::Text(text)) => text.as_bytes().to_vec(),
            // JSON control messages may arrive as binary frames
            Ok(WsMessage::Binary(data)) => data.to_vec(),
            Ok(WsMessage::Close(frame)) => {
                info!("Gemini Live closed the connection: {:?}", frame);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                writer.abort();
                anyhow::bail!("Gemini Live socket error: {}", e);
            }
        };

        let message = match LiveServerMessage::parse(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to parse Gemini Live message: {}", e);
                continue;
            }
        };

        if let Some(err) = &message.error {
            writer.abort();
            anyhow::bail!("Gemini Live error: {}", err.message);
        }

        if message.is_setup_complete() && !opened {
            opened = true;
            info!("Gemini Live setup complete");
            if event_tx.send(ChannelEvent::Open).await.is_err() {
                break;
            }
            continue;
        }

        if let Some(event) = message.into_server_event() {
            if event_tx.send(ChannelEvent::Message(event)).await.is_err() {
                break;
            }
        }
    }

    writer.abort();
    let _ = event_tx.send(ChannelEvent::Closed).await;
    Ok(())
}
