//! Error types for Tandem Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Genre mismatch")]
    GenreMismatch,

    #[error("Room is full")]
    RoomFull,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Room not active")]
    RoomNotActive,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Invalid room code: {0}")]
    InvalidRoomCode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
