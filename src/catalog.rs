use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::NewLine;

/// Money is kept in integer cents everywhere.
pub type Cents = u64;

/// A drink variation such as "Vanilla" or "Strong"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: u32,
    pub name: String,
    pub price_adjustment: Cents,
}

/// A cup size with its surcharge over the base price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSize {
    pub id: u32,
    pub name: String,
    pub price_adjustment: Cents,
}

/// A menu item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub base_price: Cents,
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub options: Vec<ProductOption>,
    #[serde(default)]
    pub sizes: Vec<ProductSize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    ProductNotFound(u32),

    #[error("{product} has no option named '{option}'")]
    UnknownOption { product: String, option: String },

    #[error("{product} has no size named '{size}'")]
    UnknownSize { product: String, size: String },

    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}

impl Product {
    /// Price of one unit with the selected option and size.
    ///
    /// Base price plus the option adjustment plus the size adjustment. A
    /// missing selection adds nothing; a selection the product does not
    /// offer is rejected.
    pub fn unit_price(&self, option: Option<&str>, size: Option<&str>) -> Result<Cents, CatalogError> {
        let option_adjustment = match option {
            Some(name) => {
                self.options
                    .iter()
                    .find(|o| o.name == name)
                    .ok_or_else(|| CatalogError::UnknownOption {
                        product: self.name.clone(),
                        option: name.to_string(),
                    })?
                    .price_adjustment
            }
            None => 0,
        };

        let size_adjustment = match size {
            Some(name) => {
                self.sizes
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| CatalogError::UnknownSize {
                        product: self.name.clone(),
                        size: name.to_string(),
                    })?
                    .price_adjustment
            }
            None => 0,
        };

        Ok(self.base_price + option_adjustment + size_adjustment)
    }

    /// Build a cart line for this product with the chosen configuration.
    pub fn configure(
        &self,
        option: Option<&str>,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<NewLine, CatalogError> {
        if quantity == 0 {
            return Err(CatalogError::InvalidQuantity);
        }

        let unit_price = self.unit_price(option, size)?;

        Ok(NewLine {
            product_id: self.id,
            name: self.name.clone(),
            unit_price,
            quantity,
            options: option.map(|o| vec![o.to_string()]).unwrap_or_default(),
            size: size.map(str::to_string),
        })
    }
}

/// The menu served by the shop
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    categories: Vec<String>,
}

impl Catalog {
    pub fn new(products: Vec<Product>, categories: Vec<String>) -> Self {
        Catalog {
            products,
            categories,
        }
    }

    /// The house menu.
    pub fn seeded() -> Self {
        let flavours = [("Regular", 0), ("Vanilla", 75), ("Caramel", 75)];

        let products = vec![
            drink(
                1,
                "Drip Coffee",
                "Batch brewed coffee",
                350,
                "/images/drip-coffee.png",
                "Coffee",
                &[(1, "Regular", 0), (2, "Strong", 50)],
                1,
            ),
            drink(
                2,
                "Latte",
                "Espresso with steamed milk",
                450,
                "/images/latte.png",
                "Lattes & Seasonal",
                &numbered(3, &flavours),
                4,
            ),
            drink(
                3,
                "Iced Coffee",
                "Brewed hot over ice",
                425,
                "/images/iced-coffee.png",
                "Other Drinks",
                &numbered(6, &flavours),
                7,
            ),
            drink(
                4,
                "Cappuccino",
                "Equal parts espresso, steamed milk, and foam",
                475,
                "/images/cappuccino.png",
                "Lattes & Seasonal",
                &[(9, "Regular", 0), (10, "Extra foam", 0)],
                10,
            ),
            drink(
                5,
                "Cold Brew",
                "Steeped for 12 hours",
                475,
                "/images/cold-brew.png",
                "Other Drinks",
                &numbered(11, &flavours),
                13,
            ),
            drink(
                6,
                "Mocha",
                "Espresso with chocolate and steamed milk",
                525,
                "/images/mocha.png",
                "Lattes & Seasonal",
                &[
                    (14, "Regular", 0),
                    (15, "White chocolate", 75),
                    (16, "Extra chocolate", 75),
                ],
                16,
            ),
        ];

        let categories = [
            "Coffee",
            "Lattes & Seasonal",
            "Non Food Item",
            "Merchandise",
            "Other Drinks",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        Catalog::new(products, categories)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, id: u32) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn require(&self, id: u32) -> Result<&Product, CatalogError> {
        self.product(id).ok_or(CatalogError::ProductNotFound(id))
    }

    pub fn products_in_category(&self, category: &str) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

fn numbered(first_id: u32, names: &[(&'static str, Cents)]) -> Vec<(u32, &'static str, Cents)> {
    names
        .iter()
        .zip(first_id..)
        .map(|(&(name, adjustment), id)| (id, name, adjustment))
        .collect()
}

// Every drink comes in Small / Medium / Large at +0 / +1.00 / +2.00
#[allow(clippy::too_many_arguments)]
fn drink(
    id: u32,
    name: &str,
    description: &str,
    base_price: Cents,
    image: &str,
    category: &str,
    options: &[(u32, &str, Cents)],
    first_size_id: u32,
) -> Product {
    let sizes = [("Small", 0), ("Medium", 100), ("Large", 200)]
        .iter()
        .zip(first_size_id..)
        .map(|(&(size, adjustment), size_id)| ProductSize {
            id: size_id,
            name: size.to_string(),
            price_adjustment: adjustment,
        })
        .collect();

    Product {
        id,
        name: name.to_string(),
        description: description.to_string(),
        base_price,
        image: image.to_string(),
        category: category.to_string(),
        options: options
            .iter()
            .map(|&(option_id, option, adjustment)| ProductOption {
                id: option_id,
                name: option.to_string(),
                price_adjustment: adjustment,
            })
            .collect(),
        sizes,
    }
}
