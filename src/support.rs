use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issue_description: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub issue_description: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupportError {
    #[error("Please describe your issue before submitting.")]
    EmptyDescription,

    #[error("Support ticket {0} not found")]
    NotFound(Uuid),
}

impl SupportTicket {
    pub fn open(user_id: Uuid, issue_description: &str) -> Result<Self, SupportError> {
        let issue_description = issue_description.trim();
        if issue_description.is_empty() {
            return Err(SupportError::EmptyDescription);
        }

        let now = Utc::now();
        Ok(SupportTicket {
            id: Uuid::new_v4(),
            user_id,
            issue_description: issue_description.to_string(),
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
        })
    }
}
