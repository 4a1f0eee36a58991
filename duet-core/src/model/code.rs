use crate::model::ids::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Whole editor contents. Each snapshot replaces the previous one; there is no merge.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeSnapshot {
    pub session_id: SessionId,
    pub from_user_id: UserId,
    pub full_text: String,
}
