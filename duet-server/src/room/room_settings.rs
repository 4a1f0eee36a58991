use std::time::Duration;

/// Per-room limits shared by every room the manager spawns.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// How long a dropped socket keeps its seat before the peer is told it left.
    pub reconnect_grace: Duration,
    /// Chat text is cut to this many characters.
    pub max_chat_len: usize,
    /// Larger code snapshots are dropped.
    pub max_code_bytes: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(15),
            max_chat_len: 2000,
            max_code_bytes: 256 * 1024,
        }
    }
}
