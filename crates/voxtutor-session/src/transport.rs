//! Transport seam between the session manager and the remote endpoint.
//!
//! The trait exists so dispatch and lifecycle logic can be driven by
//! a channel-backed fake in tests; production uses the WebSocket
//! implementation below.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::error::SessionError;
use crate::wire::{ClientMessage, ServerMessage, Setup};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

#[async_trait]
pub trait SessionTransport: Send {
    async fn send(&mut self, msg: ClientMessage) -> Result<(), SessionError>;

    /// Next inbound message. `None` means the server closed the
    /// session; the caller treats that as normal termination.
    async fn recv(&mut self) -> Option<Result<ServerMessage, SessionError>>;

    async fn close(&mut self);
}

pub struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Open the session: connect, send the setup bundle, and wait
    /// for the server's setupComplete before returning. Any failure
    /// here is terminal for the start attempt; there is no retry.
    pub async fn connect(api_key: &str, setup: Setup) -> Result<Self, SessionError> {
        let url = format!("{}?key={}", DEFAULT_ENDPOINT, api_key);
        let (ws, _) = connect_async(&url).await?;
        let mut transport = Self { ws };

        transport.send(ClientMessage::setup(setup)).await?;
        match transport.recv().await {
            Some(Ok(msg)) if msg.setup_complete.is_some() => {
                tracing::info!("Realtime session open");
                Ok(transport)
            }
            Some(Ok(_)) => Err(SessionError::Protocol(
                "expected setupComplete as the first server frame".to_string(),
            )),
            Some(Err(e)) => Err(e),
            None => Err(SessionError::Closed),
        }
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn send(&mut self, msg: ClientMessage) -> Result<(), SessionError> {
        let text = serde_json::to_string(&msg)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage, SessionError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).map_err(Into::into));
                }
                Ok(Message::Binary(bytes)) => {
                    return Some(serde_json::from_slice(&bytes).map_err(Into::into));
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue, // ping/pong frames
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!("WebSocket close: {}", e);
        }
    }
}
