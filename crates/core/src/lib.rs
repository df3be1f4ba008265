//! `shopledger-core` — record types shared by the store, exchange and reports crates.
//!
//! This crate contains **pure domain** types (no storage or file concerns).

pub mod customer;
pub mod entity;
pub mod error;
pub mod id;
pub mod order;
pub mod product;
pub mod time;

pub use customer::{Customer, CustomerDraft};
pub use entity::{Entity, NaturalKey};
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, OrderId, OrderItemId, ProductId};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus};
pub use product::{Product, ProductDraft};
