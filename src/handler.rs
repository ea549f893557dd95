//! WebSocket connection handler
//!
//! Accepts TCP connections, performs the WebSocket handshake and routes
//! each connection by request path:
//! - `/chat`: bidirectional `ChatEvent` stream driven by a `Session`
//! - `/rpc`: unary request/response frames

use std::sync::Arc;

use futures_util::{future, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::client::event_channel;
use crate::error::AppError;
use crate::message::{ChatEvent, RpcRequest, RpcResponse};
use crate::rpc::dispatch;
use crate::server::ChatServer;
use crate::session::run_session;
use crate::types::ConnectionId;

/// Path of the chat stream endpoint
pub const CHAT_PATH: &str = "/chat";
/// Path of the unary endpoint
pub const RPC_PATH: &str = "/rpc";

/// Endpoint selected by the handshake request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ChatStream,
    Rpc,
}

impl Endpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            CHAT_PATH => Some(Self::ChatStream),
            RPC_PATH => Some(Self::Rpc),
            _ => None,
        }
    }
}

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, server: Arc<ChatServer>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New TCP connection from {}", addr);
                let server = server.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, server).await {
                        warn!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, rejecting unknown paths with 404,
/// then hands the socket to the selected endpoint.
pub async fn handle_connection(
    stream: TcpStream,
    server: Arc<ChatServer>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let mut endpoint = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let path = req.uri().path();
        match Endpoint::from_path(path) {
            Some(selected) => {
                endpoint = Some(selected);
                Ok(resp)
            }
            None => {
                let mut reject = ErrorResponse::new(Some(format!("Unknown endpoint: {}", path)));
                *reject.status_mut() = StatusCode::NOT_FOUND;
                Err(reject)
            }
        }
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let endpoint = endpoint.ok_or_else(|| AppError::UnknownEndpoint(peer_addr.clone()))?;

    let conn_id = ConnectionId::new();
    info!("Connection {} from {} opened {:?}", conn_id, peer_addr, endpoint);

    let result = match endpoint {
        Endpoint::ChatStream => handle_chat_stream(ws_stream, server, conn_id).await,
        Endpoint::Rpc => handle_rpc(ws_stream, server, conn_id).await,
    };

    info!("Connection {} closed", conn_id);
    result
}

/// Serve one chat stream
///
/// A writer task drains the client's sink into the socket while the
/// session consumes inbound frames on this task.
async fn handle_chat_stream(
    ws_stream: WebSocketStream<TcpStream>,
    server: Arc<ChatServer>,
    conn_id: ConnectionId,
) -> Result<(), AppError> {
    let (mut ws_sender, ws_receiver) = ws_stream.split();
    let (sink, mut events) = event_channel();

    // Spawn write task (ChatEvent -> WebSocket)
    let write_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(WsMessage::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task for {}", conn_id);
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize {} event: {}", event.kind(), e);
                }
            }
        }
        ws_sender
    });

    let inbound = ws_receiver.filter_map(move |frame| future::ready(decode_frame(conn_id, frame)));
    let result = run_session(server, inbound, sink).await;

    // The session has deregistered, so every sink clone is gone and the
    // writer finishes once its buffer is flushed.
    let mut ws_sender = match write_task.await {
        Ok(ws_sender) => ws_sender,
        Err(e) => {
            error!("Write task for {} panicked: {}", conn_id, e);
            return result;
        }
    };

    let close = match &result {
        Err(AppError::ServerFull { .. }) => CloseFrame {
            code: CloseCode::Again,
            reason: "server full".into(),
        },
        _ => CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        },
    };
    if let Err(e) = ws_sender.send(WsMessage::Close(Some(close))).await {
        debug!("Close frame for {} not sent: {}", conn_id, e);
    }

    result
}

/// Decode one inbound frame into a session input
///
/// Undecodable text and control/binary frames are skipped; a close frame
/// or socket error ends the session.
fn decode_frame(
    conn_id: ConnectionId,
    frame: Result<WsMessage, WsError>,
) -> Option<Result<ChatEvent, AppError>> {
    match frame {
        Ok(WsMessage::Text(text)) => match serde_json::from_str::<ChatEvent>(&text) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Invalid chat event from {}: {}", conn_id, e);
                None
            }
        },
        Ok(WsMessage::Close(_)) => {
            debug!("Connection {} sent close frame", conn_id);
            Some(Err(AppError::StreamClosed))
        }
        Ok(_) => None,
        Err(e) => Some(Err(e.into())),
    }
}

/// Serve unary calls, one response frame per request frame
async fn handle_rpc(
    ws_stream: WebSocketStream<TcpStream>,
    server: Arc<ChatServer>,
    conn_id: ConnectionId,
) -> Result<(), AppError> {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while let Some(frame) = ws_receiver.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("RPC connection {} failed: {}", conn_id, e);
                break;
            }
        };

        let response = match serde_json::from_str::<RpcRequest>(&text) {
            Ok(request) => RpcResponse {
                id: Some(request.id),
                reply: dispatch(&server, request.call).await,
            },
            Err(e) => {
                warn!("Invalid RPC request from {}: {}", conn_id, e);
                RpcResponse {
                    id: None,
                    reply: AppError::Json(e).into(),
                }
            }
        };

        let json = serde_json::to_string(&response)?;
        ws_sender.send(WsMessage::Text(json.into())).await?;
    }

    Ok(())
}
