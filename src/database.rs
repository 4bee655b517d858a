//! # Database
//!
//! JSON tables on disk, one file per table, held in memory behind a lock.
//!
//! ## Layout
//!
//! ```text
//! database/
//!   users.json
//!   carts.json
//!   orders.json
//!   order_items.json
//!   notifications.json
//!   support_tickets.json
//!   order_feedback.json
//!   campaigns.json
//!   guests/<guest id>.bin.gz
//! ```
//!
//! Every mutation goes through [`Database::write`], which runs on a copy
//! of the tables and swaps it in once the copy is flushed. Identifiers and
//! timestamps are set by the server.
use std::fs::{self, create_dir_all};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::campaign::{Campaign, active_campaigns, house_campaigns};
use crate::cart::Cart;
use crate::login::User;
use crate::notification::Notification;
use crate::order::{Order, OrderFeedback, OrderItem};
use crate::support::SupportTicket;

const USERS_FILE: &str = "users.json";
const CARTS_FILE: &str = "carts.json";
const ORDERS_FILE: &str = "orders.json";
const ORDER_ITEMS_FILE: &str = "order_items.json";
const NOTIFICATIONS_FILE: &str = "notifications.json";
const TICKETS_FILE: &str = "support_tickets.json";
const FEEDBACK_FILE: &str = "order_feedback.json";
const CAMPAIGNS_FILE: &str = "campaigns.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed table data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed cart file: {0}")]
    Encoding(#[from] bincode::Error),
}

/// A signed-in user's cart row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCart {
    pub user_id: Uuid,
    pub cart: Cart,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Vec<User>,
    pub carts: Vec<StoredCart>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    pub notifications: Vec<Notification>,
    pub tickets: Vec<SupportTicket>,
    pub feedback: Vec<OrderFeedback>,
    pub campaigns: Vec<Campaign>,
}

impl Tables {
    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    /// Emails compare case-insensitively.
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    pub fn user_by_email_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    pub fn cart_for(&self, user_id: Uuid) -> Option<&Cart> {
        self.carts
            .iter()
            .find(|c| c.user_id == user_id)
            .map(|c| &c.cart)
    }

    /// The user's cart, created empty on first use.
    pub fn cart_mut(&mut self, user_id: Uuid, now: DateTime<Utc>) -> &mut Cart {
        let index = match self.carts.iter().position(|c| c.user_id == user_id) {
            Some(index) => index,
            None => {
                self.carts.push(StoredCart {
                    user_id,
                    cart: Cart::default(),
                    updated_at: now,
                });
                self.carts.len() - 1
            }
        };

        let stored = &mut self.carts[index];
        stored.updated_at = now;
        &mut stored.cart
    }

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn order_mut(&mut self, id: Uuid) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }

    /// Newest first.
    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub fn items_for_order(&self, order_id: Uuid) -> Vec<OrderItem> {
        self.order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Newest first.
    pub fn notifications_for_user(&self, user_id: Uuid) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }

    pub fn notification_mut(&mut self, id: Uuid) -> Option<&mut Notification> {
        self.notifications.iter_mut().find(|n| n.id == id)
    }

    /// Newest first.
    pub fn tickets_for_user(&self, user_id: Uuid) -> Vec<SupportTicket> {
        let mut tickets: Vec<SupportTicket> = self
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tickets
    }

    pub fn ticket(&self, id: Uuid) -> Option<&SupportTicket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    pub fn feedback_for_order(&self, order_id: Uuid) -> Option<&OrderFeedback> {
        self.feedback.iter().find(|f| f.order_id == order_id)
    }

    pub fn active_campaigns(&self, now: DateTime<Utc>) -> Vec<Campaign> {
        active_campaigns(&self.campaigns, now)
    }

    pub fn campaign(&self, id: Uuid) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }
}

pub struct Database {
    root: PathBuf,
    tables: RwLock<Tables>,
}

impl Database {
    /// Open (or initialise) the data directory.
    ///
    /// Missing tables start empty. A directory without a campaigns table
    /// gets the house campaigns.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        create_dir_all(&root)?;

        let campaigns_path = root.join(CAMPAIGNS_FILE);
        let seed_campaigns = !campaigns_path.exists();

        let mut tables = Tables {
            users: load_table(&root.join(USERS_FILE))?,
            carts: load_table(&root.join(CARTS_FILE))?,
            orders: load_table(&root.join(ORDERS_FILE))?,
            order_items: load_table(&root.join(ORDER_ITEMS_FILE))?,
            notifications: load_table(&root.join(NOTIFICATIONS_FILE))?,
            tickets: load_table(&root.join(TICKETS_FILE))?,
            feedback: load_table(&root.join(FEEDBACK_FILE))?,
            campaigns: load_table(&campaigns_path)?,
        };

        if seed_campaigns {
            tables.campaigns = house_campaigns(Utc::now());
            save_table(&campaigns_path, &tables.campaigns)?;
        }

        info!(
            "Opened database at {} ({} users, {} orders)",
            root.display(),
            tables.users.len(),
            tables.orders.len()
        );

        Ok(Database {
            root,
            tables: RwLock::new(tables),
        })
    }

    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f(&tables)
    }

    /// Run a mutation on a copy of the tables.
    ///
    /// The copy replaces the live tables only after it has been flushed.
    /// If the closure or the flush fails, readers keep seeing the old rows.
    pub fn write<R, E>(&self, f: impl FnOnce(&mut Tables) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut draft = tables.clone();
        let result = f(&mut draft)?;

        self.flush(&draft).map_err(|e| {
            error!("Failed to flush database: {e}");
            E::from(e)
        })?;

        *tables = draft;
        Ok(result)
    }

    fn flush(&self, tables: &Tables) -> Result<(), StoreError> {
        save_table(&self.root.join(USERS_FILE), &tables.users)?;
        save_table(&self.root.join(CARTS_FILE), &tables.carts)?;
        save_table(&self.root.join(ORDERS_FILE), &tables.orders)?;
        save_table(&self.root.join(ORDER_ITEMS_FILE), &tables.order_items)?;
        save_table(&self.root.join(NOTIFICATIONS_FILE), &tables.notifications)?;
        save_table(&self.root.join(TICKETS_FILE), &tables.tickets)?;
        save_table(&self.root.join(FEEDBACK_FILE), &tables.feedback)?;
        save_table(&self.root.join(CAMPAIGNS_FILE), &tables.campaigns)?;
        Ok(())
    }
}

/// Read the orders table straight from disk.
pub fn read_orders(data_dir: &Path) -> Result<Vec<Order>, StoreError> {
    load_table(&data_dir.join(ORDERS_FILE))
}

fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(serde_json::from_str(&contents)?)
}

fn save_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(rows)?;
    let tmp = path.with_extension("json.tmp");

    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    Ok(())
}
