//! The websocket session: one long-lived connection scoped to the current
//! credentials, a reader task decoding frames into engine events, a writer
//! task draining outbound frames, and a shared gateway handle that survives
//! reconnects.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{
    mpsc::{self, UnboundedSender},
    watch,
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::{
    domain::events::{EngineEvent, TransportEvent},
    infra::config::SessionConfig,
    transport::wire::{decode_event, encode_frame, OutboundFrame},
    usecases::contracts::{GatewayError, OutboundGateway},
};

const SESSION_READER_STARTED: &str = "SESSION_READER_STARTED";
const SESSION_READER_STOPPED: &str = "SESSION_READER_STOPPED";
const SESSION_CLOSED_BY_SERVER: &str = "SESSION_CLOSED_BY_SERVER";
const SESSION_FRAME_MALFORMED: &str = "SESSION_FRAME_MALFORMED";
const SESSION_WRITE_FAILED: &str = "SESSION_WRITE_FAILED";

/// Credentials and tenancy a session is opened under. Operations started
/// under one scope must never be attributed to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionScope {
    pub account_id: String,
    pub tenant_id: String,
    pub auth_token: String,
}

impl SessionScope {
    /// `None` when the config carries no token: the engine then stays
    /// disconnected instead of opening an anonymous session.
    pub fn from_config(config: &SessionConfig) -> Option<Self> {
        if config.auth_token.is_empty() {
            return None;
        }

        Some(Self {
            account_id: config.account_id.clone(),
            tenant_id: config.tenant_id.clone(),
            auth_token: config.auth_token.clone(),
        })
    }
}

#[derive(Debug)]
pub enum SessionOpenError {
    InvalidUrl(String),
    Handshake(tokio_tungstenite::tungstenite::Error),
}

impl std::fmt::Display for SessionOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "invalid session url: {url}"),
            Self::Handshake(source) => write!(f, "session handshake failed: {source}"),
        }
    }
}

impl std::error::Error for SessionOpenError {}

/// Owning handle for one live session. Dropping it signals the reader task
/// to stop without emitting a server-disconnect event.
#[derive(Debug)]
pub struct SessionHandle {
    stop_tx: Option<watch::Sender<bool>>,
}

impl SessionHandle {
    #[cfg(test)]
    pub fn inert() -> Self {
        Self { stop_tx: None }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
    }
}

/// Seam the connection manager opens sessions through; the real connector
/// dials a websocket, tests substitute a scripted one.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn open(
        &self,
        scope: &SessionScope,
        events_tx: UnboundedSender<EngineEvent>,
    ) -> Result<SessionHandle, SessionOpenError>;
}

/// Outbound gateway whose inner sender is swapped on every connect and
/// cleared on disconnect, so long-lived holders (engine, queue processor)
/// keep one handle across session generations.
#[derive(Debug, Clone, Default)]
pub struct SharedGateway {
    inner: Arc<Mutex<Option<UnboundedSender<OutboundFrame>>>>,
}

impl SharedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, outbound_tx: UnboundedSender<OutboundFrame>) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = Some(outbound_tx);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = None;
        }
    }

    fn send(&self, frame: OutboundFrame) -> Result<(), GatewayError> {
        let inner = self.inner.lock().map_err(|_| GatewayError::NotConnected)?;
        match inner.as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| GatewayError::NotConnected),
            None => Err(GatewayError::NotConnected),
        }
    }
}

#[async_trait]
impl OutboundGateway for SharedGateway {
    fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    async fn send_message(&self, payload: &serde_json::Value) -> Result<(), GatewayError> {
        self.send(OutboundFrame::SendMessage(payload.clone()))
    }

    async fn send_template(&self, payload: &serde_json::Value) -> Result<(), GatewayError> {
        self.send(OutboundFrame::SendTemplate(payload.clone()))
    }

    async fn reset_unread_count(&self, chat_id: &str) -> Result<(), GatewayError> {
        self.send(OutboundFrame::ResetUnreadCount {
            chat_id: chat_id.to_owned(),
        })
    }
}

/// Dials the real websocket endpoint and wires the reader/writer tasks.
pub struct WsConnector {
    url: String,
    gateway: SharedGateway,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, gateway: SharedGateway) -> Self {
        Self {
            url: url.into(),
            gateway,
        }
    }

    fn session_url(&self, scope: &SessionScope) -> Result<reqwest::Url, SessionOpenError> {
        reqwest::Url::parse_with_params(
            &self.url,
            &[
                ("token", scope.auth_token.as_str()),
                ("tenant", scope.tenant_id.as_str()),
                ("account", scope.account_id.as_str()),
            ],
        )
        .map_err(|_| SessionOpenError::InvalidUrl(self.url.clone()))
    }
}

#[async_trait]
impl SocketConnector for WsConnector {
    async fn open(
        &self,
        scope: &SessionScope,
        events_tx: UnboundedSender<EngineEvent>,
    ) -> Result<SessionHandle, SessionOpenError> {
        let url = self.session_url(scope)?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(SessionOpenError::Handshake)?;
        let (mut sink, mut reader) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let payload = encode_frame(&frame);
                if let Err(error) = sink.send(WsMessage::from(payload)).await {
                    tracing::warn!(
                        code = SESSION_WRITE_FAILED,
                        error = %error,
                        "outbound frame not written, closing writer"
                    );
                    break;
                }
            }
        });

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            tracing::info!(code = SESSION_READER_STARTED, "session reader started");
            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            gateway.detach();
                            tracing::info!(code = SESSION_READER_STOPPED, "session reader stopped");
                            return;
                        }
                    }
                    frame = reader.next() => {
                        match frame {
                            Some(Ok(WsMessage::Text(text))) => match decode_event(text.as_str()) {
                                Ok(event) => {
                                    if events_tx.send(EngineEvent::Inbound(event)).is_err() {
                                        gateway.detach();
                                        return;
                                    }
                                }
                                Err(error) => {
                                    tracing::warn!(
                                        code = SESSION_FRAME_MALFORMED,
                                        error = %error,
                                        "inbound frame dropped"
                                    );
                                }
                            },
                            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => {
                                gateway.detach();
                                tracing::warn!(
                                    code = SESSION_CLOSED_BY_SERVER,
                                    "session closed by server"
                                );
                                let _ = events_tx.send(EngineEvent::Transport(
                                    TransportEvent::Disconnected {
                                        server_initiated: true,
                                    },
                                ));
                                return;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }
        });

        self.gateway.attach(outbound_tx);
        Ok(SessionHandle {
            stop_tx: Some(stop_tx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_requires_an_auth_token() {
        let empty = SessionConfig::default();
        assert_eq!(SessionScope::from_config(&empty), None);

        let configured = SessionConfig {
            account_id: "agent-7".to_owned(),
            tenant_id: "acme".to_owned(),
            auth_token: "secret".to_owned(),
        };
        let scope = SessionScope::from_config(&configured).expect("scope must build");
        assert_eq!(scope.tenant_id, "acme");
    }

    #[test]
    fn gateway_without_a_session_reports_disconnected() {
        let gateway = SharedGateway::new();

        assert!(!gateway.is_connected());
    }

    #[tokio::test]
    async fn gateway_rejects_sends_without_a_session() {
        let gateway = SharedGateway::new();

        let result = gateway.send_message(&serde_json::json!({"body": "hi"})).await;

        assert_eq!(result, Err(GatewayError::NotConnected));
    }

    #[tokio::test]
    async fn attached_gateway_forwards_frames_to_the_writer() {
        let gateway = SharedGateway::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        gateway.attach(tx);

        assert!(gateway.is_connected());
        gateway
            .send_message(&serde_json::json!({"body": "hi"}))
            .await
            .expect("send must pass through");

        let frame = rx.recv().await.expect("frame must arrive");
        assert!(matches!(frame, OutboundFrame::SendMessage(_)));
    }

    #[tokio::test]
    async fn detach_disconnects_the_gateway() {
        let gateway = SharedGateway::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        gateway.attach(tx);

        gateway.detach();

        assert!(!gateway.is_connected());
        let result = gateway.reset_unread_count("chat-1").await;
        assert_eq!(result, Err(GatewayError::NotConnected));
    }

    #[test]
    fn session_url_carries_scope_parameters() {
        let connector = WsConnector::new("wss://example.test/events", SharedGateway::new());
        let scope = SessionScope {
            account_id: "agent-7".to_owned(),
            tenant_id: "acme".to_owned(),
            auth_token: "tok en".to_owned(),
        };

        let url = connector.session_url(&scope).expect("url must build");

        assert!(url.as_str().starts_with("wss://example.test/events?"));
        assert!(url.query_pairs().any(|(k, v)| k == "tenant" && v == "acme"));
        assert!(url.query_pairs().any(|(k, v)| k == "token" && v == "tok en"));
    }
}
