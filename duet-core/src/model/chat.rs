use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A chat line as rendered by clients. Lives only as long as the room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            message: message.into(),
            at,
        }
    }

    /// Builds a renderable message out of any payload.
    ///
    /// Well-formed `{user, message, at}` objects pass through. Anything else is
    /// kept visible as `{user: "Unknown", message: <stringified>, at: now}` so the
    /// message list stays deterministic.
    pub fn coerce(payload: &Value, now: DateTime<Utc>) -> Self {
        let Value::Object(fields) = payload else {
            let message = match payload {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Self::new(UNKNOWN_AUTHOR, message, now);
        };

        let user = fields
            .get("user")
            .and_then(Value::as_str)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(UNKNOWN_AUTHOR);

        let message = match fields.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => payload.to_string(),
        };

        let at = fields.get("at").and_then(parse_timestamp).unwrap_or(now);

        Self::new(user, message, at)
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
