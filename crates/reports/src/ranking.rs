//! Best-selling products.

use std::collections::HashMap;

use serde::Serialize;

use shopledger_core::ProductId;

use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    /// Σ quantity across every order item.
    pub total_sold: i64,
    /// Σ item total price.
    pub total_revenue: f64,
}

/// The `n` products with the most units sold, most first. Equal counts are
/// ordered by product id. Items of deleted products are not ranked.
pub fn top_products(data: &Dataset, n: usize) -> Vec<TopProduct> {
    let products = data.products_by_id();
    let mut totals: HashMap<ProductId, (i64, f64)> = HashMap::new();
    for item in &data.items {
        if !products.contains_key(&item.product_id) {
            continue;
        }
        let entry = totals.entry(item.product_id).or_default();
        entry.0 += item.quantity;
        entry.1 += item.total_price;
    }

    let mut ranked: Vec<TopProduct> = totals
        .into_iter()
        .filter_map(|(id, (sold, revenue))| {
            products.get(&id).map(|p| TopProduct {
                product_id: id,
                name: p.name.clone(),
                total_sold: sold,
                total_revenue: revenue,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.total_sold
            .cmp(&a.total_sold)
            .then(a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::metrics::fixtures::*;

    #[test]
    fn ranks_by_units_then_id() {
        let data = Dataset::new(
            vec![product(1, 1.0), product(2, 1.0), product(3, 1.0)],
            vec![order(1, 0.0, 0.0, 1)],
            vec![
                item(1, 1, 3, 2, 5.0),
                item(2, 1, 1, 4, 5.0),
                item(3, 1, 2, 1, 5.0),
                item(4, 1, 3, 2, 5.0),
                item(5, 1, 7, 50, 5.0),
            ],
        );

        let top = top_products(&data, 10);

        let order: Vec<(i64, i64)> = top.iter().map(|t| (t.product_id.get(), t.total_sold)).collect();
        assert_eq!(order, [(1, 4), (3, 4), (2, 1)]);
        assert_eq!(top[1].total_revenue, 20.0);
        assert_eq!(top[1].name, "produto 3");
    }

    #[test]
    fn never_returns_more_than_n() {
        let data = Dataset::new(
            vec![product(1, 1.0), product(2, 1.0)],
            vec![],
            vec![item(1, 1, 1, 1, 1.0), item(2, 1, 2, 1, 1.0)],
        );
        assert_eq!(top_products(&data, 1).len(), 1);
        assert!(top_products(&data, 0).is_empty());
        assert!(top_products(&Dataset::default(), 5).is_empty());
    }

    proptest! {
        #[test]
        fn ranking_is_sorted_and_bounded(
            sales in prop::collection::vec((1i64..6, 1i64..10), 0..40),
            n in 0usize..8,
        ) {
            let products = (1..6).map(|id| product(id, 1.0)).collect();
            let items = sales
                .iter()
                .enumerate()
                .map(|(i, (p, q))| item(i as i64 + 1, 1, *p, *q, 2.0))
                .collect();
            let data = Dataset::new(products, vec![], items);

            let top = top_products(&data, n);

            prop_assert!(top.len() <= n);
            for pair in top.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                prop_assert!(
                    a.total_sold > b.total_sold
                        || (a.total_sold == b.total_sold && a.product_id < b.product_id)
                );
            }
        }
    }
}
