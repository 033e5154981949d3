//! WebSocket protocol messages for Tilehearts.

use serde::{Deserialize, Serialize};
use tilehearts_core::{Player, Room};
use uuid::Uuid;

/// Messages sent from client to server.
///
/// The first frame on every connection must be `authenticate`; everything
/// else is rejected until then.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Present the authenticated identity for this connection
    Authenticate {
        user_id: String,
        session_id: String,
        name: String,
        email: String,
    },

    /// Create a room (or join it if the code is already live)
    CreateRoom { room_code: String },

    /// Join an existing or unseen room. `previous_user_id` is set when a
    /// reconnecting client held a different identity in this room before.
    JoinRoom {
        room_code: String,
        #[serde(default)]
        previous_user_id: Option<String>,
    },

    /// Toggle readiness; the game starts when both players are ready
    Ready { room_code: String, ready: bool },

    /// Place a heart card onto a tile
    PlaceHeart {
        room_code: String,
        tile_id: u8,
        card_id: String,
    },

    /// Play a magic card (Wind/Recycle need a target tile)
    UseMagicCard {
        room_code: String,
        card_id: String,
        #[serde(default)]
        target_tile: Option<u8>,
    },

    /// Draw from the heart deck
    DrawHeart { room_code: String },

    /// Draw from the magic deck
    DrawMagic { room_code: String },

    /// End the turn
    EndTurn { room_code: String },

    /// Leave the room
    LeaveRoom { room_code: String },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Authentication accepted; the transient socket id for this connection
    Authenticated { user_id: String, socket_id: Uuid },

    /// The caller joined a room
    RoomJoined { room: RoomInfo },

    /// Another player joined the caller's room
    PlayerJoined { player: PlayerInfo },

    /// A player left the room
    PlayerLeft { user_id: String },

    /// A player toggled readiness
    PlayerReady { user_id: String, ready: bool },

    /// The game started; clients navigate to the game view
    GameStart { room: RoomInfo, state: serde_json::Value },

    /// Post-action state delta
    GameState {
        state: serde_json::Value,
        events: Vec<serde_json::Value>,
    },

    /// The match ended
    GameOver {
        reason: String,
        winner: Option<String>,
        is_tie: bool,
    },

    /// A rejected action, reported to the originating client only
    RoomError { message: String },

    /// Pong response
    Pong,
}

/// Room information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub code: String,
    pub players: Vec<PlayerInfo>,
    pub max_players: u8,
    pub game_started: bool,
}

impl RoomInfo {
    pub fn from_room(room: &Room) -> Self {
        Self {
            code: room.code.clone(),
            players: room.players.iter().map(PlayerInfo::from_player).collect(),
            max_players: room.max_players,
            game_started: room.game.game_started,
        }
    }
}

/// Player information in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: String,
    pub name: String,
    pub is_ready: bool,
    pub score: i32,
}

impl PlayerInfo {
    pub fn from_player(player: &Player) -> Self {
        Self {
            user_id: player.user_id.clone(),
            name: player.name.clone(),
            is_ready: player.is_ready,
            score: player.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_action_names_are_kebab_case() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "use-magic-card",
            "payload": {"room_code": "ABC123", "card_id": "m-1", "target_tile": 3}
        }))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::UseMagicCard { target_tile: Some(3), .. }
        ));

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "draw-heart",
            "payload": {"room_code": "ABC123"}
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::DrawHeart { .. }));
    }

    #[test]
    fn test_join_room_previous_user_id_defaults_to_none() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "join-room",
            "payload": {"room_code": "ABC123"}
        }))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::JoinRoom {
                previous_user_id: None,
                ..
            }
        ));
    }

    #[test]
    fn test_server_event_names() {
        let msg = ServerMessage::RoomError {
            message: "Not your turn".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "room-error");

        let msg = ServerMessage::PlayerReady {
            user_id: "u1".to_string(),
            ready: true,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "player-ready");
    }
}
