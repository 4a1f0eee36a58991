use crate::signaling::SignalSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use duet_core::{ClientEvent, DuetError, ServerEvent};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket connection to the relay. Outbound events go through a writer task,
/// inbound frames are decoded once and handed out on a channel.
pub struct RelayClient {
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RelayClient {
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>)> {
        let (stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to relay at {url}"))?;
        info!("Connected to relay {}", url);

        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    error!("Relay write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match ServerEvent::decode_lenient(text.as_str(), Utc::now()) {
                            Ok(event) => {
                                if in_tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed relay frame: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Relay reader finished");
        });

        Ok((
            Self {
                outbound: Mutex::new(Some(out_tx)),
                writer: Mutex::new(Some(writer)),
                reader: Mutex::new(Some(reader)),
            },
            in_rx,
        ))
    }
}

#[async_trait]
impl SignalSink for RelayClient {
    async fn send(&self, event: ClientEvent) -> Result<(), DuetError> {
        let json = event.encode()?;
        let guard = self.outbound.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| DuetError::NetworkDisconnect("relay disconnected".into()))?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| DuetError::NetworkDisconnect("relay writer stopped".into()))
    }

    async fn disconnect(&self) {
        if let Some(tx) = self.outbound.lock().await.take() {
            let _ = tx.send(Message::Close(None));
        }
        // Let the writer flush the close frame.
        if let Some(writer) = self.writer.lock().await.take()
            && tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, writer).await.is_err()
        {
            warn!("Relay writer did not finish in time");
        }
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        info!("Relay connection closed");
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        for slot in [&self.writer, &self.reader] {
            if let Ok(mut guard) = slot.try_lock()
                && let Some(task) = guard.take()
            {
                task.abort();
            }
        }
    }
}
