use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderStatus,
    System,
}

/// A message for a user. Reading it flips `read`; the row is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(user_id: Uuid, kind: NotificationKind, message: impl Into<String>) -> Self {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            kind,
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }
}

pub const PASSWORD_CHANGED: &str = "Your password has been successfully updated.";

pub fn order_placed(short_id: &str) -> String {
    format!("Your order has been placed. Complete payment to start preparation. Order #{short_id}")
}

pub fn status_changed(short_id: &str, status: OrderStatus) -> String {
    let what = match status {
        OrderStatus::Pending => "We have received your order.",
        OrderStatus::Preparing => "Your order is now being prepared.",
        OrderStatus::Packing => "Your order is being packed.",
        OrderStatus::Delivering => "Your order is on the way.",
        OrderStatus::Completed => "Your order has been delivered.",
        OrderStatus::Cancelled => "Your order has been cancelled.",
    };

    format!("{what} Order #{short_id}")
}

pub fn feedback_thanks(short_id: &str) -> String {
    format!("Thank you for your feedback on order #{short_id}! We appreciate your input.")
}
