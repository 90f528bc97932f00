//! TCP server hosting story rooms
//!
//! Each connection gets a fresh identity, a writer task fed by an mpsc
//! channel, and a read loop that dispatches protocol envelopes. Narration
//! for one room runs inside that room's sender loop, so a slow backend
//! never blocks turns in other rooms.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tandem_core::{
    lifecycle, EndReason, Orchestrator, RoomCode, RoomEvent, RoomNotifier, SessionRegistry,
};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{validate_content, ClientMessage, ServerMessage};

/// State shared across connection tasks
struct Shared {
    registry: Arc<SessionRegistry>,
    orchestrator: Orchestrator,
    /// Live outbound channels by connection identity
    peers: RwLock<HashMap<Uuid, mpsc::Sender<ServerMessage>>>,
}

impl Shared {
    /// Deliver one message to one identity. Skips silently when the peer is
    /// absent or its channel has closed - a disconnected partner must never
    /// fault the other occupant's flow.
    async fn send_to(&self, identity: Uuid, msg: ServerMessage) {
        let tx = { self.peers.read().await.get(&identity).cloned() };
        if let Some(tx) = tx {
            if tx.send(msg).await.is_err() {
                debug!(identity = %identity, "Peer channel closed, dropping message");
            }
        }
    }
}

#[async_trait]
impl RoomNotifier for Shared {
    async fn notify(&self, code: &RoomCode, event: RoomEvent) {
        let Some(room_arc) = self.registry.room(code).await else {
            return;
        };

        // Compute per-occupant views under the room lock, deliver after.
        let deliveries = {
            let room = room_arc.lock().await;
            [room.slot1, room.slot2]
                .into_iter()
                .flatten()
                .filter_map(|occupant| {
                    self.registry
                        .snapshot_for(&room, occupant.identity)
                        .map(|view| (occupant.identity, view))
                })
                .collect::<Vec<_>>()
        };

        for (identity, view) in deliveries {
            let msg = match event {
                RoomEvent::Updated => ServerMessage::RoomUpdated { room: view },
                RoomEvent::Thinking => ServerMessage::AiThinking { room: view },
                RoomEvent::Ended => ServerMessage::StoryEnded { room: view },
            };
            self.send_to(identity, msg).await;
        }
    }
}

/// Story server handle
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the listener and start accepting participants
    pub async fn start(
        port: u16,
        registry: Arc<SessionRegistry>,
        orchestrator: Orchestrator,
    ) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);

        let shared = Arc::new(Shared {
            registry,
            orchestrator,
            peers: RwLock::new(HashMap::new()),
        });

        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(accept_loop(listener, shared, shutdown_rx));

        Ok(Server {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let shared = shared.clone();
                        tokio::spawn(handle_connection(stream, addr, shared));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single participant connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Arc<Shared>) {
    let identity = Uuid::new_v4();
    let (mut reader, writer) = tokio::io::split(stream);

    let (msg_tx, msg_rx) = mpsc::channel(64);
    shared.peers.write().await.insert(identity, msg_tx);
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    info!(addr = %addr, identity = %identity, "Participant connected");

    loop {
        match read_frame::<_, ClientMessage>(&mut reader).await {
            Ok(msg) => {
                dispatch(msg, identity, &shared).await;
            }
            Err(Error::Protocol(e)) => {
                // Bad payload in an intact frame: report and keep reading.
                warn!(identity = %identity, error = %e, "Malformed message");
                shared
                    .send_to(
                        identity,
                        ServerMessage::Error {
                            message: "Malformed message".to_string(),
                        },
                    )
                    .await;
            }
            Err(Error::ConnectionClosed) => {
                debug!(identity = %identity, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Read error");
                break;
            }
        }
    }

    // Disconnection is not an error: silent cleanup.
    writer_handle.abort();
    shared.peers.write().await.remove(&identity);
    shared.registry.remove_identity(identity).await;

    info!(identity = %identity, "Participant disconnected");
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<ServerMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Handle one inbound envelope
async fn dispatch(msg: ClientMessage, identity: Uuid, shared: &Arc<Shared>) {
    match msg {
        ClientMessage::JoinRoom {
            code,
            attribute,
            genre,
        } => {
            handle_join(identity, code, attribute, genre, shared).await;
        }

        ClientMessage::SendMessage { content } => {
            if let Err(reason) = validate_content(&content) {
                shared
                    .send_to(identity, ServerMessage::Error { message: reason })
                    .await;
                return;
            }
            if let Err(e) = shared
                .orchestrator
                .submit_turn(identity, content, shared.as_ref())
                .await
            {
                shared
                    .send_to(
                        identity,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }

        ClientMessage::EndStory => {
            if let Some((code, _)) = shared.registry.room_for_identity(identity).await {
                if shared.registry.end_room(&code, EndReason::Requested).await {
                    shared.notify(&code, RoomEvent::Ended).await;
                }
            }
        }

        ClientMessage::LeaveRoom => {
            shared.registry.remove_identity(identity).await;
        }
    }
}

/// Handle a join request
async fn handle_join(
    identity: Uuid,
    code: String,
    attribute: tandem_core::Attribute,
    genre: tandem_core::Genre,
    shared: &Arc<Shared>,
) {
    // Boundary validation: the core only ever sees well-formed codes.
    let code = match RoomCode::parse(&code) {
        Ok(code) => code,
        Err(e) => {
            shared
                .send_to(
                    identity,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                )
                .await;
            return;
        }
    };

    match shared
        .registry
        .create_or_join(identity, code.clone(), attribute, genre)
        .await
    {
        Ok(outcome) => {
            info!(
                identity = %identity,
                code = %code,
                slot = ?outcome.slot,
                new = outcome.is_new,
                "Joined room"
            );

            let view = {
                let room = outcome.room.lock().await;
                shared.registry.snapshot_for(&room, identity)
            };
            if let Some(view) = view {
                shared
                    .send_to(identity, ServerMessage::RoomJoined { room: view })
                    .await;
            }

            if outcome.activated {
                lifecycle::arm_session_countdown(&shared.registry, &code, shared.clone()).await;
                if let Err(e) = shared
                    .orchestrator
                    .open_story(&code, shared.as_ref())
                    .await
                {
                    warn!(code = %code, error = %e, "Failed to open story");
                }
            }
        }
        Err(e) => {
            shared
                .send_to(
                    identity,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                )
                .await;
        }
    }
}
