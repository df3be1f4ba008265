//! `shopledger-reports` — revenue, cost, profit and outstanding figures.
//!
//! Every function here is pure over a [`Dataset`] snapshot. Cost uses each
//! product's current cost price; no historical cost is kept.

pub mod dataset;
pub mod metrics;
pub mod ranking;

pub use dataset::Dataset;
pub use metrics::{
    FinancialSummary, summarize, total_cost, total_outstanding, total_profit, total_revenue,
    windowed,
};
pub use ranking::{TopProduct, top_products};
