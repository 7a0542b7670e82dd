//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Opaque player identity assigned on join
pub type PlayerId = Uuid;

/// Score table as sent on the wire (ordered so every encoding is identical)
pub type ScoreTable = BTreeMap<PlayerId, u32>;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request to join (or create) the room for a match
    Join {
        #[serde(rename = "match")]
        match_name: String,
    },

    /// Key state sampled by the client
    Input {
        /// Client clock, only used to order inputs within a tick
        timestamp: f64,
        #[serde(default)]
        keys: KeyState,
    },
}

impl ClientMsg {
    /// Decode a text frame, mapping failures to a wire error code
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }
}

/// Raw key flags as the browser client names them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyState {
    /// Move left
    pub a: bool,
    /// Move right
    pub d: bool,
    /// Jump
    pub w: bool,
    /// Rigid mode while held
    pub space: bool,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once to the joining connection
    Welcome {
        id: PlayerId,
        map: Vec<Platform>,
        round: u32,
    },

    /// A round has begun
    Start { round: u32 },

    /// Full room state, sent every tick while a round is playing
    Snapshot {
        players: Vec<PlayerSnapshot>,
        scores: ScoreTable,
        round: u32,
    },

    /// Result of a finished round
    RoundWinner { round: u32, winner: RoundOutcome },

    /// Score table after a round was won
    ScoreUpdate { scores: ScoreTable },

    /// A player reached the winning score
    MatchWinner { winner: PlayerId, scores: ScoreTable },

    /// A message from this connection could not be handled
    Error { code: String, message: String },
}

/// Static platform rectangle, centred on (x, y)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    /// Timestamp of the newest input applied for this player
    pub last_processed_input: f64,
    pub is_rigid: bool,
}

/// Winner of a round, encoded as the player id or the string "draw"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Winner(PlayerId),
    Draw,
}

impl Serialize for RoundOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RoundOutcome::Winner(id) => id.serialize(serializer),
            RoundOutcome::Draw => serializer.serialize_str("draw"),
        }
    }
}

/// Errors surfaced to a client over its own connection
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Binary frames are not supported")]
    BinaryFrame,

    #[error("Input received before joining a room")]
    NotInRoom,

    #[error("Connection already joined a room")]
    AlreadyJoined,
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "bad_message",
            ProtocolError::BinaryFrame => "unsupported_frame",
            ProtocolError::NotInRoom => "not_in_room",
            ProtocolError::AlreadyJoined => "already_joined",
        }
    }

    pub fn to_msg(&self) -> ServerMsg {
        ServerMsg::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}
