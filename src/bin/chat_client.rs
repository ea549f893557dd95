//! Interactive chat client
//!
//! Prompts for a nickname, joins through `/rpc`, then streams chat events
//! over `/chat` until the user types `exit` or closes stdin.

use std::time::Duration;

use clap::Parser;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use group_chat_server::banner::print_title;
use group_chat_server::logging::init_tracing;
use group_chat_server::{
    is_valid_nickname, AppError, Args, ChatEvent, Config, IdGenerator, Message, RpcCall, RpcReply,
    RpcRequest, RpcResponse, User, CHAT_PATH, RPC_PATH,
};

/// Client-side deadline for the join call
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing("group_chat_server=warn");

    let config = Config::load(&args);
    print_title("Group Chat Client", true);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let Some(username) = prompt_username(&mut lines).await? else {
        return Ok(());
    };

    let base_url = format!("ws://{}", config.address());
    let user = timeout(JOIN_TIMEOUT, join(&base_url, &username))
        .await
        .map_err(|_| AppError::Timeout)??;
    println!("Joined as {} (ID: {})", user.name, user.id);

    let (ws_stream, _) = connect_async(format!("{}{}", base_url, CHAT_PATH)).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    send_event(&mut ws_sender, &ChatEvent::UserJoined(user.clone())).await?;

    // Spawn receive task (WebSocket -> console)
    let mut receive_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ChatEvent>(&text) {
                    Ok(event) => println!("{}", event),
                    Err(e) => warn!("Invalid event from server: {}", e),
                },
                Ok(WsMessage::Close(frame)) => {
                    match frame {
                        Some(frame) if !frame.reason.is_empty() => {
                            println!("Stream closed: {}", frame.reason)
                        }
                        _ => println!("Stream closed"),
                    }
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    println!("Stream closed: {}", e);
                    break;
                }
            }
        }
    });

    println!("Type messages (or 'exit' to quit):");
    let ids = IdGenerator::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(text) = line? else { break };
                if text.trim().eq_ignore_ascii_case("exit") {
                    break;
                }
                if text.trim().is_empty() {
                    continue;
                }
                let msg = Message::new(ids.next_message_id(), Some(user.clone()), text);
                send_event(&mut ws_sender, &ChatEvent::Message(msg)).await?;
            }
            _ = &mut receive_task => {
                return Ok(());
            }
        }
    }

    if let Err(e) = send_event(&mut ws_sender, &ChatEvent::UserLeft(user)).await {
        debug!("Failed to announce leave: {}", e);
    }
    if let Err(e) = ws_sender.close().await {
        debug!("Failed to close stream: {}", e);
    }
    match timeout(Duration::from_secs(1), receive_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Receive task failed: {}", e),
        Err(_) => debug!("Receive task did not finish after close"),
    }

    Ok(())
}

/// Ask until the nickname policy accepts the input; None on end of input
async fn prompt_username(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>, AppError> {
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"Enter Username: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let username = line.trim();
        if is_valid_nickname(username) {
            return Ok(Some(username.to_string()));
        }
        println!("Invalid username. Use 3-12 chars, start with letter, only letters/numbers/_");
    }
}

/// Call `join` on the unary endpoint
async fn join(base_url: &str, username: &str) -> Result<User, AppError> {
    let (mut ws_stream, _) = connect_async(format!("{}{}", base_url, RPC_PATH)).await?;

    let request = RpcRequest {
        id: 1,
        call: RpcCall::Join {
            username: username.to_string(),
        },
    };
    ws_stream
        .send(WsMessage::Text(serde_json::to_string(&request)?.into()))
        .await?;

    let response = next_response(&mut ws_stream).await?;
    if let Err(e) = ws_stream.close(None).await {
        debug!("Failed to close rpc connection: {}", e);
    }

    match response.reply {
        RpcReply::Join { user, .. } => Ok(user),
        RpcReply::Error { message, .. } => Err(AppError::UnexpectedReply(message)),
        other => Err(AppError::UnexpectedReply(format!("{:?}", other))),
    }
}

/// Read frames until a unary response arrives
async fn next_response(ws_stream: &mut Socket) -> Result<RpcResponse, AppError> {
    while let Some(frame) = ws_stream.next().await {
        match frame? {
            WsMessage::Text(text) => return Ok(serde_json::from_str(&text)?),
            WsMessage::Close(_) => break,
            _ => continue,
        }
    }
    Err(AppError::StreamClosed)
}

async fn send_event(
    ws_sender: &mut SplitSink<Socket, WsMessage>,
    event: &ChatEvent,
) -> Result<(), AppError> {
    let json = serde_json::to_string(event)?;
    ws_sender.send(WsMessage::Text(json.into())).await?;
    Ok(())
}
