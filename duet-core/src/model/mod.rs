mod chat;
mod code;
mod feedback;
mod ids;
mod participant;
mod session;
mod signaling;

pub use chat::{ChatMessage, UNKNOWN_AUTHOR};
pub use code::CodeSnapshot;
pub use feedback::{Feedback, Rating};
pub use ids::{ConnectionId, SessionId, UserId};
pub use participant::{ConnectionState, Participant, Role};
pub use session::{Session, SessionStatus, Transition};
pub use signaling::{
    ClientEvent, IceCandidate, IceConfig, IceServerConfig, PeerPresence, ServerEvent,
};
