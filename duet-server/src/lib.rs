mod api;
mod app;
mod config;
mod ice;
mod room;
mod sessions;
mod signaling;

pub use app::{AppState, build_router};
pub use config::ServerConfig;
pub use ice::IceConfigProvider;
pub use room::*;
pub use sessions::*;
pub use signaling::*;
