pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// Minutes before `slot_utc` when a participant may enter the room without consent.
pub const JOIN_LEAD_MINUTES: i64 = 5;

pub fn default_stun_urls() -> Vec<String> {
    vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()]
}
