//! WebSocket server and connection handling.
//!
//! Every connection must present an `authenticate` frame before anything
//! else. Mutating room actions run through one pipeline: validate, take
//! the room's turn lock, mutate, persist (best-effort), release, then
//! broadcast. Dashmap references are always dropped before broadcasting.

use crate::locks::TurnLockManager;
use crate::protocol::{ClientMessage, RoomInfo, ServerMessage};
use crate::session::SessionManager;
use crate::store::{RoomStore, SessionStore};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

use tilehearts_core::{
    determine_winner, migrate_player_data, normalize_room_code, sanitize_text,
    validate_player_in_room, validate_player_name, validate_room_state, GameAction, Room,
};

/// Identity bound to a connection by its `authenticate` frame.
#[derive(Debug, Clone)]
struct AuthedUser {
    user_id: String,
    name: String,
    email: String,
}

/// Server state shared across all connections.
pub struct ServerState {
    /// All live rooms, keyed by canonical room code
    pub rooms: DashMap<String, Room>,
    /// Mapping from socket ID to its message sender
    pub senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Per-room action serialization
    pub locks: TurnLockManager,
    /// Player sessions, keyed by durable user id
    pub sessions: SessionManager,
    /// Durable room persistence (best-effort)
    pub room_store: Arc<dyn RoomStore>,
}

impl ServerState {
    pub fn new(room_store: Arc<dyn RoomStore>, session_store: Arc<dyn SessionStore>) -> Self {
        Self {
            rooms: DashMap::new(),
            senders: DashMap::new(),
            locks: TurnLockManager::new(),
            sessions: SessionManager::new(session_store),
            room_store,
        }
    }

    /// Send a message to a specific socket.
    pub fn send_to_socket(&self, socket_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&socket_id) {
            let _ = sender.send(msg);
        }
    }

    /// Send a message to a user's currently attached socket, if any.
    pub fn send_to_user(&self, user_id: &str, msg: ServerMessage) {
        if let Some(socket_id) = self.sessions.socket_for(user_id) {
            self.send_to_socket(socket_id, msg);
        }
    }

    /// Broadcast a message to every player in a room.
    pub fn broadcast_to_room(&self, room_code: &str, msg: ServerMessage) {
        let members = self.room_members(room_code);
        for user_id in members {
            self.send_to_user(&user_id, msg.clone());
        }
    }

    fn room_members(&self, room_code: &str) -> Vec<String> {
        self.rooms
            .get(room_code)
            .map(|room| room.players.iter().map(|p| p.user_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Write-through to the room store. Store failures are logged and
    /// swallowed; in-memory state stays authoritative.
    fn persist_room(&self, room: &Room) {
        if let Err(e) = self.room_store.upsert(room) {
            warn!(room_code = %room.code, error = %e, "failed to persist room");
        }
    }
}

/// The client-visible address: the first `X-Forwarded-For` entry when the
/// connection came through a proxy, the peer address otherwise.
pub fn resolve_client_ip(forwarded: Option<&str>, peer: Option<SocketAddr>) -> String {
    if let Some(header) = forwarded {
        if let Some(first) = header.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 64
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Tilehearts server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let mut forwarded: Option<String> = None;
    let ws_stream = accept_hdr_async(stream, |req: &Request, response: Response| {
        forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(response)
    })
    .await?;

    let client_ip = resolve_client_ip(forwarded.as_deref(), Some(addr));
    info!("New WebSocket connection from {}", client_ip);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let socket_id = Uuid::new_v4();

    // Authentication phase: the first text frame decides the connection's
    // fate. Anything other than a valid `authenticate` closes it.
    let user = loop {
        let Some(msg) = ws_receiver.next().await else {
            return Ok(());
        };
        match msg? {
            Message::Text(text) => match authenticate_first_frame(&text) {
                Ok(user) => break user,
                Err(reason) => {
                    let reject = ServerMessage::RoomError {
                        message: reason.to_string(),
                    };
                    ws_sender
                        .send(Message::Text(serde_json::to_string(&reject)?.into()))
                        .await?;
                    ws_sender.send(Message::Close(None)).await?;
                    warn!("Rejected connection from {}: {}", client_ip, reason);
                    return Ok(());
                }
            },
            Message::Close(_) => return Ok(()),
            _ => continue,
        }
    };

    let session = state.sessions.get_player_session(
        &user.user_id,
        &user.session_id,
        &user.name,
        &user.email,
        &client_ip,
    );
    state.sessions.update_player_socket(&user.user_id, socket_id);
    info!(
        user_id = %session.user_id,
        %socket_id,
        "Player authenticated"
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.senders.insert(socket_id, tx);
    state.send_to_socket(
        socket_id,
        ServerMessage::Authenticated {
            user_id: user.user_id.clone(),
            socket_id,
        },
    );

    // Forward outgoing messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let authed = AuthedUser {
        user_id: user.user_id.clone(),
        name: user.name,
        email: user.email,
    };

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(socket_id, &authed, client_msg, &state);
                } else {
                    warn!("Invalid message from {}: {}", socket_id, text);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", socket_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_socket(socket_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", socket_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect. The player stays in their room so a
    // reconnecting client can resume or migrate.
    state.sessions.mark_inactive(&authed.user_id, socket_id);
    state.senders.remove(&socket_id);
    send_task.abort();

    info!("Connection closed for {}", socket_id);
    Ok(())
}

#[derive(Debug)]
struct AuthFrame {
    user_id: String,
    session_id: String,
    name: String,
    email: String,
}

fn authenticate_first_frame(text: &str) -> Result<AuthFrame, &'static str> {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        return Err("Authentication required");
    };
    let ClientMessage::Authenticate {
        user_id,
        session_id,
        name,
        email,
    } = msg
    else {
        return Err("Authentication required");
    };
    if user_id.trim().is_empty() {
        return Err("User not found");
    }
    if !is_valid_user_id(&user_id) {
        return Err("Invalid user ID format");
    }
    Ok(AuthFrame {
        user_id,
        session_id,
        name,
        email,
    })
}

/// Handle a client message from an authenticated connection.
fn handle_message(socket_id: Uuid, user: &AuthedUser, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        // A second authenticate frame is a no-op
        ClientMessage::Authenticate { .. } => {}

        ClientMessage::CreateRoom { room_code } => {
            handle_join(socket_id, user, state, &room_code, None);
        }

        ClientMessage::JoinRoom {
            room_code,
            previous_user_id,
        } => {
            handle_join(socket_id, user, state, &room_code, previous_user_id);
        }

        ClientMessage::Ready { room_code, ready } => {
            handle_ready(socket_id, user, state, &room_code, ready);
        }

        ClientMessage::PlaceHeart {
            room_code,
            tile_id,
            card_id,
        } => {
            handle_game_action(
                socket_id,
                user,
                state,
                &room_code,
                GameAction::PlaceHeart { tile_id, card_id },
            );
        }

        ClientMessage::UseMagicCard {
            room_code,
            card_id,
            target_tile,
        } => {
            handle_game_action(
                socket_id,
                user,
                state,
                &room_code,
                GameAction::UseMagic {
                    card_id,
                    target_tile,
                },
            );
        }

        ClientMessage::DrawHeart { room_code } => {
            handle_game_action(socket_id, user, state, &room_code, GameAction::DrawHeart);
        }

        ClientMessage::DrawMagic { room_code } => {
            handle_game_action(socket_id, user, state, &room_code, GameAction::DrawMagic);
        }

        ClientMessage::EndTurn { room_code } => {
            handle_game_action(socket_id, user, state, &room_code, GameAction::EndTurn);
        }

        ClientMessage::LeaveRoom { room_code } => {
            handle_leave(socket_id, user, state, &room_code);
        }

        ClientMessage::Ping => {
            state.send_to_socket(socket_id, ServerMessage::Pong);
        }
    }
}

/// Structural checks applied before delegating a game action: the room's
/// started/current-player invariant must hold, and the caller must be a
/// member. Returns the rejection reason when either fails.
fn room_integrity_error(room: &Room, user_id: &str) -> Option<String> {
    let state_check = validate_room_state(Some(room));
    if !state_check.valid {
        return state_check.error;
    }
    let membership = validate_player_in_room(Some(room), user_id);
    if !membership.valid {
        return membership.error;
    }
    None
}

fn reject(state: &ServerState, socket_id: Uuid, message: &str) {
    state.send_to_socket(
        socket_id,
        ServerMessage::RoomError {
            message: message.to_string(),
        },
    );
}

/// Create-or-join: both paths resolve to the same get-or-insert on the
/// room map. `previous_user_id` triggers an identity migration when the
/// reconnecting client held a different id in this room before.
fn handle_join(
    socket_id: Uuid,
    user: &AuthedUser,
    state: &Arc<ServerState>,
    room_code: &str,
    previous_user_id: Option<String>,
) {
    let Some(code) = normalize_room_code(room_code) else {
        reject(state, socket_id, "Invalid room code");
        return;
    };
    // Client-supplied text never reaches room state unsanitized
    let name = sanitize_text(&user.name);
    let email = sanitize_text(&user.email);
    let name_check = validate_player_name(&name);
    if !name_check.valid {
        let message = name_check.error.as_deref().unwrap_or("Invalid name");
        reject(state, socket_id, message);
        return;
    }

    let holder = socket_id.to_string();
    if !state.locks.acquire(&code, &holder) {
        reject(state, socket_id, "Action in progress, please wait");
        return;
    }

    let outcome = {
        let mut room = state.rooms.entry(code.clone()).or_insert_with(|| {
            let mut rng = rand::thread_rng();
            Room::new(code.clone(), &mut rng)
        });

        // Reconnect under a new identity: remap everything the old id owned
        if let Some(old_id) = previous_user_id.as_deref() {
            if old_id != user.user_id && room.player(old_id).is_some() {
                info!(room_code = %code, %old_id, new_id = %user.user_id, "migrating player identity");
                *room = migrate_player_data(room.clone(), old_id, &user.user_id, &name, &email);
            }
        }

        let result = if room.player(&user.user_id).is_some() {
            // Rejoining a room the player is already in is fine
            Ok(())
        } else {
            let joined_at = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            room.add_player(&user.user_id, &name, &email, joined_at)
                .map_err(|e| e.to_string())
        };

        match result {
            Ok(()) => {
                state.persist_room(&room);
                Ok(RoomInfo::from_room(&room))
            }
            Err(message) => Err(message),
        }
    };
    state.locks.release(&code, &holder);

    match outcome {
        Ok(room_info) => {
            state.send_to_socket(
                socket_id,
                ServerMessage::RoomJoined {
                    room: room_info.clone(),
                },
            );
            let joined = room_info
                .players
                .iter()
                .find(|p| p.user_id == user.user_id)
                .cloned();
            if let Some(player) = joined {
                for other in room_info.players.iter().filter(|p| p.user_id != user.user_id) {
                    state.send_to_user(
                        &other.user_id,
                        ServerMessage::PlayerJoined {
                            player: player.clone(),
                        },
                    );
                }
            }
        }
        Err(message) => reject(state, socket_id, &message),
    }
}

fn handle_ready(
    socket_id: Uuid,
    user: &AuthedUser,
    state: &Arc<ServerState>,
    room_code: &str,
    ready: bool,
) {
    let Some(code) = normalize_room_code(room_code) else {
        reject(state, socket_id, "Room not found");
        return;
    };
    let holder = socket_id.to_string();
    if !state.locks.acquire(&code, &holder) {
        reject(state, socket_id, "Action in progress, please wait");
        return;
    }

    let outcome = {
        let Some(mut room) = state.rooms.get_mut(&code) else {
            state.locks.release(&code, &holder);
            reject(state, socket_id, "Room not found");
            return;
        };
        match room.set_ready(&user.user_id, ready) {
            Ok(()) => {
                let started = if room.is_full() && room.all_ready() && !room.game.game_started {
                    let mut rng = rand::thread_rng();
                    match room.start_game(&mut rng) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(room_code = %code, error = %e, "ready players but game failed to start");
                            false
                        }
                    }
                } else {
                    false
                };
                state.persist_room(&room);
                let info = RoomInfo::from_room(&room);
                let game_state = if started {
                    serde_json::to_value(&room.game).ok()
                } else {
                    None
                };
                Ok((info, game_state))
            }
            Err(e) => Err(e.to_string()),
        }
    };
    state.locks.release(&code, &holder);

    match outcome {
        Ok((room_info, game_state)) => {
            state.broadcast_to_room(
                &code,
                ServerMessage::PlayerReady {
                    user_id: user.user_id.clone(),
                    ready,
                },
            );
            if let Some(game_state) = game_state {
                state.broadcast_to_room(
                    &code,
                    ServerMessage::GameStart {
                        room: room_info,
                        state: game_state,
                    },
                );
            }
        }
        Err(message) => reject(state, socket_id, &message),
    }
}

fn handle_game_action(
    socket_id: Uuid,
    user: &AuthedUser,
    state: &Arc<ServerState>,
    room_code: &str,
    action: GameAction,
) {
    let Some(code) = normalize_room_code(room_code) else {
        reject(state, socket_id, "Room not found");
        return;
    };
    let holder = socket_id.to_string();
    if !state.locks.acquire(&code, &holder) {
        reject(state, socket_id, "Action in progress, please wait");
        return;
    }

    let outcome = {
        let Some(mut room) = state.rooms.get_mut(&code) else {
            state.locks.release(&code, &holder);
            reject(state, socket_id, "Room not found");
            return;
        };
        if let Some(message) = room_integrity_error(&room, &user.user_id) {
            drop(room);
            state.locks.release(&code, &holder);
            reject(state, socket_id, &message);
            return;
        }
        let mut rng = rand::thread_rng();
        match room.apply_action(&user.user_id, action, &mut rng) {
            Ok(events) => {
                state.persist_room(&room);
                let game_state = serde_json::to_value(&room.game).unwrap_or(Value::Null);
                let events: Vec<Value> = events
                    .iter()
                    .filter_map(|e| serde_json::to_value(e).ok())
                    .collect();
                let game_over = if room.game.game_ended {
                    let summary = determine_winner(&room.players);
                    room.game.end_reason.map(|reason| ServerMessage::GameOver {
                        reason: reason.to_string(),
                        winner: summary.winner,
                        is_tie: summary.is_tie,
                    })
                } else {
                    None
                };
                Ok((game_state, events, game_over))
            }
            Err(e) => Err(e.to_string()),
        }
    };
    state.locks.release(&code, &holder);

    match outcome {
        Ok((game_state, events, game_over)) => {
            state.broadcast_to_room(
                &code,
                ServerMessage::GameState {
                    state: game_state,
                    events,
                },
            );
            if let Some(game_over) = game_over {
                state.broadcast_to_room(&code, game_over);
            }
        }
        Err(message) => reject(state, socket_id, &message),
    }
}

fn handle_leave(socket_id: Uuid, user: &AuthedUser, state: &Arc<ServerState>, room_code: &str) {
    let Some(code) = normalize_room_code(room_code) else {
        reject(state, socket_id, "Room not found");
        return;
    };
    let holder = socket_id.to_string();
    if !state.locks.acquire(&code, &holder) {
        reject(state, socket_id, "Action in progress, please wait");
        return;
    }

    let outcome = {
        let Some(mut room) = state.rooms.get_mut(&code) else {
            state.locks.release(&code, &holder);
            reject(state, socket_id, "Room not found");
            return;
        };
        match room.remove_player(&user.user_id) {
            Ok(is_empty) => {
                if !is_empty {
                    state.persist_room(&room);
                }
                Ok(is_empty)
            }
            Err(e) => Err(e.to_string()),
        }
    };

    state.locks.release(&code, &holder);

    match outcome {
        Ok(is_empty) => {
            if is_empty {
                state.rooms.remove(&code);
                if let Err(e) = state.room_store.delete(&code) {
                    warn!(room_code = %code, error = %e, "failed to delete room");
                }
            } else {
                state.broadcast_to_room(
                    &code,
                    ServerMessage::PlayerLeft {
                        user_id: user.user_id.clone(),
                    },
                );
            }
        }
        Err(message) => reject(state, socket_id, &message),
    }
}
