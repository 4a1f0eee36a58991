use duet_core::utils::default_stun_urls;
use duet_core::{IceConfig, IceServerConfig, UserId};
use std::time::Duration;
use tracing::{debug, warn};

/// Builds the ICE server list handed to clients. TURN credentials are
/// short-lived and derived from a shared secret (TURN REST scheme).
#[derive(Debug, Clone)]
pub struct IceConfigProvider {
    stun_urls: Vec<String>,
    turn_urls: Vec<String>,
    turn_secret: Option<String>,
    credential_ttl: Duration,
}

impl Default for IceConfigProvider {
    fn default() -> Self {
        Self::new(default_stun_urls(), Vec::new(), None, Duration::from_secs(3600))
    }
}

impl IceConfigProvider {
    pub fn new(
        stun_urls: Vec<String>,
        turn_urls: Vec<String>,
        turn_secret: Option<String>,
        credential_ttl: Duration,
    ) -> Self {
        Self {
            stun_urls,
            turn_urls,
            turn_secret,
            credential_ttl,
        }
    }

    pub fn has_turn(&self) -> bool {
        !self.turn_urls.is_empty() && self.turn_secret.is_some()
    }

    pub fn config_for(&self, user_id: UserId) -> IceConfig {
        let mut ice_servers = Vec::new();
        if !self.stun_urls.is_empty() {
            ice_servers.push(IceServerConfig {
                urls: self.stun_urls.clone(),
                username: None,
                credential: None,
            });
        }

        if let Some(secret) = self.turn_secret.as_deref()
            && !self.turn_urls.is_empty()
        {
            match turn::auth::generate_long_term_credentials(secret, self.credential_ttl) {
                Ok((username, credential)) => {
                    debug!("Issued TURN credentials for user {}", user_id);
                    ice_servers.push(IceServerConfig {
                        urls: self.turn_urls.clone(),
                        username: Some(username),
                        credential: Some(credential),
                    });
                }
                Err(e) => warn!(
                    "Failed to generate TURN credentials for user {}: {}; STUN only",
                    user_id, e
                ),
            }
        }

        IceConfig { ice_servers }
    }
}
