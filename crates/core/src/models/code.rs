//! Room code - the external identifier for a story session

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A six-digit numeric room code.
///
/// Codes are chosen by participants (or generated for them) and act as the
/// map key for live rooms. The parse is the only way to construct one, so
/// every `RoomCode` in the system is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    pub const LEN: usize = 6;

    /// Parse a room code, requiring exactly six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s.len() != Self::LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidRoomCode(format!(
                "expected {} digits, got {:?}",
                Self::LEN,
                s
            )));
        }
        Ok(RoomCode(s.to_string()))
    }

    /// Generate a random room code.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let digits: String = (0..Self::LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..10)))
            .collect();
        RoomCode(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomCode::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> String {
        code.0
    }
}
