//! `shopledger-exchange` — spreadsheet exchange for backup and external editing.
//!
//! **Responsibility:**
//! - workbook model and its CSV-directory form ([`Workbook`])
//! - entity ⇄ sheet mapping for "Produtos", "Clientes" and "Pedidos" ([`codec`])
//! - additive, name-resolved import ([`ReconciliationEngine`])
//! - full, product-only and financial-report exports ([`Exporter`])

pub mod codec;
pub mod error;
pub mod export;
pub mod reconcile;
pub mod workbook;

pub use codec::{KEY_COLUMNS, REQUIRED_SHEETS, RowError};
pub use error::{ExchangeError, ExchangeResult};
pub use export::Exporter;
pub use reconcile::{ImportOutcome, ImportReport, ImportWarning, ReconciliationEngine, Tally};
pub use workbook::{Sheet, Workbook};
