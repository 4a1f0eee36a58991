use chrono::Duration as ChronoDuration;
use duet_core::utils::JOIN_LEAD_MINUTES;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the relay, e.g. `ws://host:3000/ws`.
    pub relay_url: String,
    /// Base URL of the session API, e.g. `http://host:3000`.
    pub api_base_url: String,
    /// How long before the slot a participant may join without consent.
    pub join_lead: ChronoDuration,
    /// Wait in ICE `failed` before tearing down and offering again.
    pub retry_delay: Duration,
    /// How long to wait for `joined` / `join_denied`.
    pub join_timeout: Duration,
    pub clock_store_dir: PathBuf,
    /// Embeddable room page of the external conferencing provider.
    pub external_room_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000/ws".to_string(),
            api_base_url: "http://127.0.0.1:3000".to_string(),
            join_lead: ChronoDuration::minutes(JOIN_LEAD_MINUTES),
            retry_delay: Duration::from_secs(5),
            join_timeout: Duration::from_secs(10),
            clock_store_dir: std::env::temp_dir().join("duet-clock"),
            external_room_base_url: "https://meet.jit.si".to_string(),
        }
    }
}
