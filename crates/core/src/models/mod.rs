//! Domain models for paired story sessions

mod code;
mod entry;
mod genre;
mod participant;
mod room;
mod view;

pub use code::RoomCode;
pub use entry::{EntryKind, TurnEntry};
pub use genre::Genre;
pub use participant::{Attribute, Occupant, Slot};
pub use room::{Room, RoomState};
pub use view::RoomView;
