use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::Cents;

/// Identity of a cart line. Two adds with the same key land on one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey<'a> {
    pub product_id: u32,
    pub options: &'a [String],
    pub size: Option<&'a str>,
}

/// A configured product on its way into a cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    pub product_id: u32,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl NewLine {
    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            product_id: self.product_id,
            options: &self.options,
            size: self.size.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: u32,
    pub name: String,
    pub unit_price: Cents,
    pub quantity: u32,
    pub options: Vec<String>,
    pub size: Option<String>,
}

impl CartLine {
    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            product_id: self.product_id,
            options: &self.options,
            size: self.size.as_deref(),
        }
    }

    pub fn line_total(&self) -> Cents {
        self.unit_price * Cents::from(self.quantity)
    }
}

/// Everything the cart reducer understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    AddItem(NewLine),
    RemoveItem(Uuid),
    UpdateQuantity { id: Uuid, quantity: i64 },
    Clear,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Cart line {0} not found")]
    LineNotFound(Uuid),

    #[error("Quantity must be at least 1")]
    EmptyAdd,
}

/// Selected items for a user or a guest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: CartAction) -> Result<(), CartError> {
        match action {
            CartAction::AddItem(line) => self.add_item(line).map(|_| ()),
            CartAction::RemoveItem(id) => self.remove_item(id),
            CartAction::UpdateQuantity { id, quantity } => self.update_quantity(id, quantity),
            CartAction::Clear => {
                self.clear();
                Ok(())
            }
        }
    }

    /// Add a configured product, returning the id of the line it landed on.
    pub fn add_item(&mut self, line: NewLine) -> Result<Uuid, CartError> {
        if line.quantity == 0 {
            return Err(CartError::EmptyAdd);
        }

        if let Some(index) = self.position_of(&line.key()) {
            let existing = &mut self.lines[index];
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        self.lines.push(CartLine {
            id,
            product_id: line.product_id,
            name: line.name,
            unit_price: line.unit_price,
            quantity: line.quantity,
            options: line.options,
            size: line.size,
        });

        Ok(id)
    }

    pub fn remove_item(&mut self, id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != id);

        if self.lines.len() == before {
            return Err(CartError::LineNotFound(id));
        }

        Ok(())
    }

    /// Set a line's quantity; zero or less drops the line.
    pub fn update_quantity(&mut self, id: Uuid, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            return self.remove_item(id);
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(CartError::LineNotFound(id))?;
        line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn position_of(&self, key: &LineKey<'_>) -> Option<usize> {
        self.lines.iter().position(|l| l.key() == *key)
    }

    pub fn line(&self, id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn subtotal(&self) -> Cents {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |count, l| count.saturating_add(l.quantity))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Fold another cart into this one, summing quantities per key.
    pub fn merge(&mut self, other: Cart) {
        for line in other.lines {
            let index = self.position_of(&line.key());
            match index {
                Some(index) => {
                    let existing = &mut self.lines[index];
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => self.lines.push(line),
            }
        }
    }
}
