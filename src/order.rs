use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cart::Cart;
use crate::catalog::Cents;
use crate::pricing::{MAX_TIP, OrderTotals, PricingRules, format_price, quote};

/// Order lifecycle. Serialised as the lowercase status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Packing,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Packing => "packing",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Users may only cancel before the order leaves the shop.
    pub fn can_cancel(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Packing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Position in [`STATUS_STEPS`]; `None` for cancelled orders.
    pub fn step_index(self) -> Option<usize> {
        STATUS_STEPS.iter().position(|step| step.status == self)
    }

    /// Forward along the steps, or to cancelled while still cancellable.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        if next == OrderStatus::Cancelled {
            return self.can_cancel();
        }

        match (self.step_index(), next.step_index()) {
            (Some(current), Some(target)) => target > current,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "preparing" => Ok(OrderStatus::Preparing),
            "packing" => Ok(OrderStatus::Packing),
            "delivering" => Ok(OrderStatus::Delivering),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

/// One row of the order tracking stepper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStep {
    pub status: OrderStatus,
    pub label: &'static str,
    pub description: &'static str,
}

pub const STATUS_STEPS: [StatusStep; 5] = [
    StatusStep {
        status: OrderStatus::Pending,
        label: "Order Placed",
        description: "We have received your order.",
    },
    StatusStep {
        status: OrderStatus::Preparing,
        label: "Preparing",
        description: "We are preparing your order.",
    },
    StatusStep {
        status: OrderStatus::Packing,
        label: "Packing",
        description: "Your order is being packed.",
    },
    StatusStep {
        status: OrderStatus::Delivering,
        label: "On The Way",
        description: "Your order is on the way.",
    },
    StatusStep {
        status: OrderStatus::Completed,
        label: "Delivered",
        description: "Your order has been delivered.",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub status: OrderStatus,
    pub label: &'static str,
    pub description: &'static str,
    pub done: bool,
    pub current: bool,
}

/// The stepper as rendered for an order in `status`.
pub fn tracking_steps(status: OrderStatus) -> Vec<StepView> {
    let current = status.step_index();

    STATUS_STEPS
        .iter()
        .enumerate()
        .map(|(index, step)| StepView {
            status: step.status,
            label: step.label,
            description: step.description,
            done: current.is_some_and(|c| index <= c),
            current: current == Some(index),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOption {
    Store,
    Delivery,
    Takeaway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Your cart is empty. Add some items before placing an order.")]
    EmptyCart,

    #[error("Please enter a delivery address")]
    MissingDeliveryAddress,

    #[error("Please select a delivery time")]
    MissingDeliveryTime,

    #[error("Please select a pickup time")]
    MissingPickupTime,

    #[error("Tips are limited to {}", format_price(MAX_TIP))]
    TipTooLarge(Cents),

    #[error("Order total is too large")]
    TotalOutOfRange,

    #[error("Order {0} not found")]
    NotFound(Uuid),

    #[error("Order cannot be cancelled once it is {0}")]
    NotCancellable(OrderStatus),

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order has already been paid (status: {0})")]
    NotPending(OrderStatus),

    #[error("Please fill out all required fields")]
    MissingPaymentDetails,

    #[error("Unknown order status '{0}'")]
    UnknownStatus(String),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Feedback can only be left on completed orders")]
    NotCompleted,

    #[error("Feedback was already submitted for this order")]
    FeedbackExists,
}

/// What the customer picks at the cart page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub delivery_option: DeliveryOption,
    #[serde(default)]
    pub delivery_address: Option<String>,
    /// Delivery time, or pickup time for takeaway
    #[serde(default)]
    pub delivery_time: Option<String>,
    #[serde(default)]
    pub tip: Cents,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl CheckoutRequest {
    pub fn validate(&self, cart: &Cart) -> Result<(), OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if self.tip > MAX_TIP {
            return Err(OrderError::TipTooLarge(self.tip));
        }

        match self.delivery_option {
            DeliveryOption::Delivery => {
                if !present(&self.delivery_address) {
                    return Err(OrderError::MissingDeliveryAddress);
                }
                if !present(&self.delivery_time) {
                    return Err(OrderError::MissingDeliveryTime);
                }
            }
            DeliveryOption::Takeaway => {
                if !present(&self.delivery_time) {
                    return Err(OrderError::MissingPickupTime);
                }
            }
            DeliveryOption::Store => {}
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subtotal: Cents,
    pub tax: Cents,
    pub tip: Cents,
    pub delivery_fee: Cents,
    pub total: Cents,
    pub delivery_option: DeliveryOption,
    pub delivery_address: Option<String>,
    pub delivery_time: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line frozen into an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: u32,
    pub product_name: String,
    pub quantity: u32,
    pub options: Vec<String>,
    pub price: Cents,
    pub size: Option<String>,
}

impl Order {
    /// Snapshot a cart into a pending order and its items.
    pub fn from_cart(
        user_id: Uuid,
        cart: &Cart,
        request: &CheckoutRequest,
        rules: &PricingRules,
        now: DateTime<Utc>,
    ) -> Result<(Order, Vec<OrderItem>), OrderError> {
        request.validate(cart)?;

        let totals = quote(cart.subtotal(), request.delivery_option, request.tip, rules)?;
        let id = Uuid::new_v4();

        let delivery_address = match request.delivery_option {
            DeliveryOption::Delivery => request.delivery_address.clone(),
            DeliveryOption::Store | DeliveryOption::Takeaway => None,
        };
        let delivery_time = match request.delivery_option {
            DeliveryOption::Store => None,
            DeliveryOption::Delivery | DeliveryOption::Takeaway => request.delivery_time.clone(),
        };

        let order = Order {
            id,
            user_id,
            subtotal: totals.subtotal,
            tax: totals.tax,
            tip: totals.tip,
            delivery_fee: totals.delivery_fee,
            total: totals.total,
            delivery_option: request.delivery_option,
            delivery_address,
            delivery_time,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let items = cart
            .lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                order_id: id,
                product_id: line.product_id,
                product_name: line.name.clone(),
                quantity: line.quantity,
                options: line.options.clone(),
                price: line.unit_price,
                size: line.size.clone(),
            })
            .collect();

        Ok((order, items))
    }

    /// `Order #1a2b3c4d`, the reference shown to customers
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            delivery_fee: self.delivery_fee,
            tip: self.tip,
            total: self.total,
        }
    }

    pub fn advance(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_advance_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::NotCancellable(self.status));
        }

        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Record payment. Only flips a pending order to preparing.
    pub fn pay(&mut self, details: &PaymentDetails, now: DateTime<Utc>) -> Result<(), OrderError> {
        details.validate()?;

        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotPending(self.status));
        }

        self.advance(OrderStatus::Preparing, now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub payment_method: PaymentMethod,
}

impl PaymentDetails {
    pub fn validate(&self) -> Result<(), OrderError> {
        let fields = [&self.full_name, &self.phone_number, &self.email];

        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(OrderError::MissingPaymentDetails);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl FeedbackRequest {
    pub fn validate(&self, order: &Order) -> Result<(), OrderError> {
        if !(1..=5).contains(&self.rating) {
            return Err(OrderError::InvalidRating(self.rating));
        }

        if order.status != OrderStatus::Completed {
            return Err(OrderError::NotCompleted);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFeedback {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
