//! Client-side connection handling

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tandem_core::{Attribute, Genre, RoomCode, RoomView};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ClientMessage, ServerMessage};

/// Events delivered to the client application
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Joined (or created) a room
    RoomJoined(RoomView),
    /// Room state changed
    RoomUpdated(RoomView),
    /// The narrator is composing a response
    AiThinking(RoomView),
    /// The story has ended
    StoryEnded(RoomView),
    /// Server-reported error for this connection
    ErrorMessage(String),
    /// Connection to server lost
    Disconnected,
}

/// A connection to a story server
pub struct Client {
    cmd_tx: mpsc::Sender<ClientMessage>,
    event_rx: mpsc::Receiver<ServerEvent>,
    task: JoinHandle<()>,
}

impl Client {
    /// Connect to a server. No handshake: the connection is anonymous
    /// until the first `join_room`.
    pub async fn connect(addr: SocketAddr) -> Result<Client> {
        let stream = TcpStream::connect(addr).await?;
        debug!(addr = %addr, "Connected to server");

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(64);

        let task = tokio::spawn(connection_task(stream, cmd_rx, event_tx));

        Ok(Client {
            cmd_tx,
            event_rx,
            task,
        })
    }

    /// Start a fresh room under a generated code and return the code so the
    /// caller can share it with a partner.
    pub async fn create_room(&self, attribute: Attribute, genre: Genre) -> Result<RoomCode> {
        let code = RoomCode::generate();
        self.join_room(code.as_str(), attribute, genre).await?;
        Ok(code)
    }

    /// Create or join the room for `code`
    pub async fn join_room(&self, code: &str, attribute: Attribute, genre: Genre) -> Result<()> {
        self.send(ClientMessage::JoinRoom {
            code: code.to_string(),
            attribute,
            genre,
        })
        .await
    }

    /// Submit a turn
    pub async fn send_message(&self, content: &str) -> Result<()> {
        self.send(ClientMessage::SendMessage {
            content: content.to_string(),
        })
        .await
    }

    /// End the story for both occupants
    pub async fn end_story(&self) -> Result<()> {
        self.send(ClientMessage::EndStory).await
    }

    /// Leave the current room, keeping the connection open
    pub async fn leave_room(&self) -> Result<()> {
        self.send(ClientMessage::LeaveRoom).await
    }

    /// Receive the next server event. Returns `None` once the connection
    /// task has finished and all buffered events have been drained.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.event_rx.recv().await
    }

    /// Close the connection
    pub async fn disconnect(self) {
        drop(self.cmd_tx);
        self.task.abort();
    }

    async fn send(&self, msg: ClientMessage) -> Result<()> {
        self.cmd_tx
            .send(msg)
            .await
            .map_err(|_| Error::NotConnected)
    }
}

/// Map a wire message to an application event
fn map_event(msg: ServerMessage) -> ServerEvent {
    match msg {
        ServerMessage::RoomJoined { room } => ServerEvent::RoomJoined(room),
        ServerMessage::RoomUpdated { room } => ServerEvent::RoomUpdated(room),
        ServerMessage::AiThinking { room } => ServerEvent::AiThinking(room),
        ServerMessage::StoryEnded { room } => ServerEvent::StoryEnded(room),
        ServerMessage::Error { message } => ServerEvent::ErrorMessage(message),
    }
}

/// Drives the socket: reads server frames, writes queued commands
async fn connection_task(
    stream: TcpStream,
    mut cmd_rx: mpsc::Receiver<ClientMessage>,
    event_tx: mpsc::Sender<ServerEvent>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    loop {
        tokio::select! {
            result = read_frame::<_, ServerMessage>(&mut reader) => {
                match result {
                    Ok(msg) => {
                        if event_tx.send(map_event(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(Error::Protocol(e)) => {
                        // Stream is still framed; skip the bad payload.
                        warn!(error = %e, "Ignoring malformed server message");
                    }
                    Err(e) => {
                        debug!(error = %e, "Connection lost");
                        let _ = event_tx.send(ServerEvent::Disconnected).await;
                        break;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            debug!(error = %e, "Write failed");
                            let _ = event_tx.send(ServerEvent::Disconnected).await;
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}
