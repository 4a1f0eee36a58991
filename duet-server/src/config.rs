use crate::ice::IceConfigProvider;
use crate::room::RoomSettings;
use clap::Parser;
use duet_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "duet-server", about = "Signaling relay and session API for two-party interviews")]
pub struct ServerConfig {
    #[arg(long, env = "DUET_BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: SocketAddr,

    #[arg(
        long,
        env = "DUET_STUN_URLS",
        value_delimiter = ',',
        default_values_t = [DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()]
    )]
    pub stun_urls: Vec<String>,

    #[arg(long, env = "DUET_TURN_URLS", value_delimiter = ',')]
    pub turn_urls: Vec<String>,

    #[arg(long, env = "DUET_TURN_SECRET", hide_env_values = true)]
    pub turn_secret: Option<String>,

    #[arg(long, env = "DUET_TURN_TTL_SECS", default_value_t = 3600)]
    pub turn_ttl_secs: u64,

    /// Seconds a dropped participant keeps their seat before the peer is told they left.
    #[arg(long, env = "DUET_RECONNECT_GRACE_SECS", default_value_t = 15)]
    pub reconnect_grace_secs: u64,

    #[arg(long, env = "DUET_MAX_CHAT_LEN", default_value_t = 2000)]
    pub max_chat_len: usize,

    #[arg(long, env = "DUET_MAX_CODE_BYTES", default_value_t = 256 * 1024)]
    pub max_code_bytes: usize,

    /// JSON array of sessions loaded at startup.
    #[arg(long, env = "DUET_SESSIONS_FILE")]
    pub sessions_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            reconnect_grace: Duration::from_secs(self.reconnect_grace_secs),
            max_chat_len: self.max_chat_len,
            max_code_bytes: self.max_code_bytes,
        }
    }

    pub fn ice_provider(&self) -> IceConfigProvider {
        IceConfigProvider::new(
            self.stun_urls.clone(),
            self.turn_urls.clone(),
            self.turn_secret.clone(),
            Duration::from_secs(self.turn_ttl_secs),
        )
    }
}
