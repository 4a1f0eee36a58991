mod channels;
mod config;
mod interview;
mod lifecycle;
mod media;
mod peer;
mod signaling;
mod transport;

pub use channels::*;
pub use config::ClientConfig;
pub use interview::*;
pub use lifecycle::*;
pub use media::*;
pub use peer::*;
pub use signaling::*;
pub use transport::*;
