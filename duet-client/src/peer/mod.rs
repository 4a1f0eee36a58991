mod peer_connection_manager;
mod peer_state;

pub use peer_connection_manager::*;
pub use peer_state::*;
