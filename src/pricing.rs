use serde::{Deserialize, Serialize};

use crate::catalog::Cents;
use crate::order::{DeliveryOption, OrderError};

pub const DEFAULT_TAX_PERCENT: u32 = 10;
pub const DEFAULT_DELIVERY_FEE: Cents = 200;
/// Largest tip accepted at checkout ($1,000.00)
pub const MAX_TIP: Cents = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    pub tax_percent: u32,
    pub delivery_fee: Cents,
}

impl Default for PricingRules {
    fn default() -> Self {
        PricingRules {
            tax_percent: DEFAULT_TAX_PERCENT,
            delivery_fee: DEFAULT_DELIVERY_FEE,
        }
    }
}

/// The money lines shown at checkout and frozen into an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Cents,
    pub tax: Cents,
    pub delivery_fee: Cents,
    pub tip: Cents,
    pub total: Cents,
}

/// Tax on a subtotal, rounded half up to the cent. `None` on overflow.
pub fn tax_on(subtotal: Cents, tax_percent: u32) -> Option<Cents> {
    subtotal
        .checked_mul(Cents::from(tax_percent))?
        .checked_add(50)
        .map(|scaled| scaled / 100)
}

/// Price a checkout. Tips above [`MAX_TIP`] are rejected.
pub fn quote(
    subtotal: Cents,
    delivery_option: DeliveryOption,
    tip: Cents,
    rules: &PricingRules,
) -> Result<OrderTotals, OrderError> {
    if tip > MAX_TIP {
        return Err(OrderError::TipTooLarge(tip));
    }

    let tax = tax_on(subtotal, rules.tax_percent).ok_or(OrderError::TotalOutOfRange)?;
    let delivery_fee = match delivery_option {
        DeliveryOption::Delivery => rules.delivery_fee,
        DeliveryOption::Store | DeliveryOption::Takeaway => 0,
    };

    let total = [tax, delivery_fee, tip]
        .into_iter()
        .try_fold(subtotal, Cents::checked_add)
        .ok_or(OrderError::TotalOutOfRange)?;

    Ok(OrderTotals {
        subtotal,
        tax,
        delivery_fee,
        tip,
        total,
    })
}

pub fn format_price(cents: Cents) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}
