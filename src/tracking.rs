//! Order status polling.
//!
//! An [`OrderTracker`] asks a [`StatusSource`] for an order's status on a
//! fixed interval and reports each change on a channel. It stops once the
//! order reaches a terminal status, disappears, or nobody is listening.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

use crate::database::{Database, StoreError, read_orders};
use crate::order::{OrderStatus, StepView, tracking_steps};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

const CHANNEL_CAPACITY: usize = 16;

/// Where the current status of an order comes from
pub trait StatusSource: Send + Sync + 'static {
    /// `Ok(None)` when the order does not exist.
    fn fetch_status(&self, order_id: Uuid) -> Result<Option<OrderStatus>, StoreError>;
}

impl StatusSource for Database {
    fn fetch_status(&self, order_id: Uuid) -> Result<Option<OrderStatus>, StoreError> {
        Ok(self.read(|t| t.order(order_id).map(|o| o.status)))
    }
}

impl<S: StatusSource + ?Sized> StatusSource for Arc<S> {
    fn fetch_status(&self, order_id: Uuid) -> Result<Option<OrderStatus>, StoreError> {
        (**self).fetch_status(order_id)
    }
}

/// Reads the orders table from a data directory on every poll, so a tracker
/// in another process sees the server's writes.
#[derive(Debug, Clone)]
pub struct OrdersFile {
    data_dir: PathBuf,
}

impl OrdersFile {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        OrdersFile {
            data_dir: data_dir.into(),
        }
    }
}

impl StatusSource for OrdersFile {
    fn fetch_status(&self, order_id: Uuid) -> Result<Option<OrderStatus>, StoreError> {
        let orders = read_orders(&self.data_dir)?;
        Ok(orders.iter().find(|o| o.id == order_id).map(|o| o.status))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingUpdate {
    pub status: OrderStatus,
    /// Position in the stepper; `None` once cancelled
    pub step: Option<usize>,
    pub steps: Vec<StepView>,
}

impl TrackingUpdate {
    pub fn new(status: OrderStatus) -> Self {
        TrackingUpdate {
            status,
            step: status.step_index(),
            steps: tracking_steps(status),
        }
    }
}

/// Why a tracker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingEnd {
    Terminal(OrderStatus),
    Missing,
    Closed,
}

pub struct OrderTracker<S> {
    source: S,
    order_id: Uuid,
    interval: Duration,
}

impl<S: StatusSource> OrderTracker<S> {
    pub fn new(source: S, order_id: Uuid) -> Self {
        OrderTracker {
            source,
            order_id,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling on the runtime.
    pub fn spawn(self) -> (mpsc::Receiver<TrackingUpdate>, JoinHandle<TrackingEnd>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    /// Poll until the order settles. The first poll happens immediately.
    pub async fn run(self, tx: mpsc::Sender<TrackingUpdate>) -> TrackingEnd {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last: Option<OrderStatus> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => {
                    debug!("Tracker for order {} lost its receiver", self.order_id);
                    return TrackingEnd::Closed;
                }
            }

            let status = match self.source.fetch_status(self.order_id) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    info!("Order {} no longer exists, stopping tracker", self.order_id);
                    return TrackingEnd::Missing;
                }
                Err(e) => {
                    warn!("Failed to read status of order {}: {e}", self.order_id);
                    continue;
                }
            };

            if last != Some(status) {
                last = Some(status);
                if tx.send(TrackingUpdate::new(status)).await.is_err() {
                    return TrackingEnd::Closed;
                }
            }

            if status.is_terminal() {
                return TrackingEnd::Terminal(status);
            }
        }
    }
}
