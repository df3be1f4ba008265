//! Snapshot of everything the figures are computed from.

use std::collections::HashMap;

use shopledger_core::{Order, OrderItem, Product, ProductId};
use shopledger_store::{Catalog, Ledger, Store, StoreResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
}

impl Dataset {
    pub fn new(products: Vec<Product>, orders: Vec<Order>, items: Vec<OrderItem>) -> Self {
        Self {
            products,
            orders,
            items,
        }
    }

    /// Read the full extent of the store.
    pub async fn load(store: &Store) -> StoreResult<Self> {
        let products = Catalog::new(store.clone()).list().await?;
        let ledger = Ledger::new(store.clone());
        let orders: Vec<_> = ledger
            .list_orders()
            .await?
            .into_iter()
            .map(|summary| summary.order)
            .collect();
        let items = ledger.list_items().await?;
        tracing::debug!(
            products = products.len(),
            orders = orders.len(),
            items = items.len(),
            "report dataset loaded"
        );
        Ok(Self::new(products, orders, items))
    }

    pub(crate) fn products_by_id(&self) -> HashMap<ProductId, &Product> {
        self.products.iter().map(|p| (p.id, p)).collect()
    }
}
