//! WebSocket server loop
//!
//! Accepts peer connections, greets them, and wires each socket to the hub:
//! a spawned send task drains the connection's outbound queue into the sink,
//! while the accept task's read loop feeds inbound text frames to the router.
//! Disconnection unregisters the peer and aborts its send task.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::envelope::WELCOME_TEXT;
use crate::hub::Hub;

/// WebSocket server for peer connections
pub struct HubServer {
    hub: Arc<Hub>,
}

impl HubServer {
    /// Create a new server sharing the given hub
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Accept peer connections until the task is aborted
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("hub listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let hub = self.hub.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(hub, stream).await {
                            tracing::warn!("connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(hub: Arc<Hub>, stream: TcpStream) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    ws_sender.send(Message::Text(WELCOME_TEXT.to_owned())).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = hub.register(tx);

    // Forward queued outbound frames to the socket; a queued close frame
    // ends the stream from our side.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let closing = matches!(frame, Message::Close(_));
            if ws_sender.send(frame).await.is_err() {
                break;
            }
            if closing {
                let _ = ws_sender.close().await;
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => hub.handle_frame(id, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(peer = id, "websocket error: {}", e);
                break;
            }
        }
    }

    hub.unregister(id);
    send_task.abort();

    Ok(())
}
