//! Quality assurance checks of running sources

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QaCheck {
    pub id: Uuid,
    pub source_id: Uuid,
    pub checked_by: Uuid,
    /// Action taken on the source; `None` while the check is open
    pub source_action: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QaCheck {
    pub fn new(source_id: Uuid, checked_by: Uuid, comment: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            checked_by,
            source_action: None,
            comment,
            created_at: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.source_action.is_none()
    }
}
