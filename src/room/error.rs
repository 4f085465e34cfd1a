use std::fmt;

/// Errors a `Room` method returns to its caller (dispatch loop, registry).
/// These never cross a task boundary as panics — the taxonomy in spec §7
/// says state inconsistencies are logged and skipped, never fatal.
#[derive(Debug)]
pub enum RoomError {
    AtCapacity,
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtCapacity => write!(f, "room is at capacity"),
        }
    }
}

impl std::error::Error for RoomError {}
