//! `shopledger-store` — SQLite persistence for products, customers and orders.
//!
//! **Responsibility:**
//! - bring a store of unknown prior shape to the canonical schema ([`SchemaStore`])
//! - advisory reference checks before deletes ([`IntegrityGuard`])
//! - order lifecycle with transactional multi-step writes ([`Ledger`])
//! - product and customer records ([`Catalog`], [`Customers`])
//! - best-effort name resolution for records arriving without ids ([`NameIndex`])
//!
//! Every component receives an explicit [`Store`] handle; there is no global
//! connection. The model is single-writer: callers await each operation
//! before issuing the next.

pub mod catalog;
pub mod customers;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod resolver;
mod row;
pub mod schema;
pub mod store;

pub use catalog::Catalog;
pub use customers::Customers;
pub use error::{StoreError, StoreResult};
pub use guard::IntegrityGuard;
pub use ledger::{Ledger, OrderChanges, OrderLineView, OrderSummary, OverpaymentPolicy};
pub use resolver::{NameIndex, Resolved};
pub use schema::{SchemaReport, SchemaStore, TableDrift};
pub use store::Store;
