/*!
# Came Coffee Storefront

Backend for a coffee shop's online storefront, built in Rust.

## Overview

Customers browse the menu, configure drinks, keep a cart (as a guest or
signed in), check out for in-store, takeaway or delivery, pay, and follow
their order through the tracking stepper. Operators move orders along;
every status change is written to the customer's notifications.

## Architecture

### HTTP Layer
- **Technologies**: Rust, axum, tower-http
- JSON API under `/api`, sessions in a `session` cookie or a bearer token,
  guest carts keyed by a `guest` cookie

### Domain Layer
- Catalog with option and size surcharges
- Cart reducer with line merging by product, options and size
- Pricing in integer cents: 10% tax rounded half up, delivery fee on
  delivery orders only
- Order lifecycle `pending → preparing → packing → delivering → completed`,
  with cancellation before the order leaves the shop

### Data Persistence Layer
- JSON tables under the data directory, flushed after every mutation
- Guest carts as gzip-compressed bincode files, pruned once abandoned

## Modules

- **catalog**: Products, options, sizes and unit prices
- **cart**: Cart lines and the cart reducer
- **pricing**: Tax, delivery fee and order totals
- **order**: Checkout, status transitions, payment and feedback
- **notification**: Per-user notifications and their messages
- **support**: Support tickets
- **campaign**: Landing page campaigns
- **login**: Accounts, password rules, sessions and auth handlers
- **mailer**: Password reset emails
- **saving**: Guest cart persistence with compression
- **database**: File-backed tables
- **tracking**: Order status polling
- **config**: Environment configuration
- **error**: Error umbrella and HTTP mapping
- **app**: Routing and server
*/

#[cfg(feature = "web")]
pub mod app;
pub mod campaign;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod login;
pub mod mailer;
pub mod notification;
pub mod order;
pub mod pricing;
pub mod saving;
pub mod support;
pub mod tracking;

pub use cart::{Cart, CartAction, CartLine, NewLine};
pub use catalog::{Catalog, Cents, Product};
pub use config::Config;
pub use database::{Database, StoreError};
pub use error::AppError;
pub use order::{Order, OrderStatus};
pub use pricing::{OrderTotals, PricingRules};
pub use tracking::{OrderTracker, StatusSource, TrackingEnd, TrackingUpdate};
