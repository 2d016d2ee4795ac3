//! JSON frames exchanged over the WebSocket. File bytes travel as
//! base64 strings inside the frame.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Frames a participant sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Must be the first frame on a new connection.
    Register { identity: String },
    Message { body: String },
    File { file_name: String, data: String },
}

/// Frames the relay sends to a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Registered,
    Error { message: String },
    Message { sender: String, body: String },
    File {
        sender: String,
        file_name: String,
        data: String,
    },
    Roster { identities: Vec<String> },
}

pub fn encode_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_bytes(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}
