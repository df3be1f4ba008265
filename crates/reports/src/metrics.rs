//! Money totals.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use shopledger_core::{Order, OrderItem, Product, ProductId};

use crate::dataset::Dataset;

/// Headline figures over a set of orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FinancialSummary {
    /// Σ paid amount.
    pub revenue: f64,
    /// Σ current product cost × quantity over the orders' items.
    pub cost: f64,
    pub profit: f64,
    /// Σ max(0, total − paid) per order.
    pub outstanding: f64,
    pub order_count: usize,
    pub paid_order_count: usize,
}

pub fn total_revenue(orders: &[Order]) -> f64 {
    orders.iter().fold(0.0, |acc, o| acc + o.paid_amount)
}

/// Items whose product no longer exists cost nothing.
pub fn total_cost(items: &[OrderItem], products: &[Product]) -> f64 {
    let costs: HashMap<ProductId, f64> = products.iter().map(|p| (p.id, p.cost_price)).collect();
    items.iter().fold(0.0, |acc, i| {
        acc + costs.get(&i.product_id).copied().unwrap_or(0.0) * i.quantity as f64
    })
}

pub fn total_profit(data: &Dataset) -> f64 {
    total_revenue(&data.orders) - total_cost(&data.items, &data.products)
}

/// Overpaid orders count as zero, never negative.
pub fn total_outstanding(orders: &[Order]) -> f64 {
    orders.iter().fold(0.0, |acc, o| acc + o.outstanding_clamped())
}

/// Figures over every order.
pub fn summarize(data: &Dataset) -> FinancialSummary {
    summary_of(&data.orders, &data.items, &data.products)
}

/// Figures over orders created within the trailing `days` days before `now`.
pub fn windowed(data: &Dataset, days: u32, now: DateTime<Utc>) -> FinancialSummary {
    let since = now - Duration::days(i64::from(days));
    let orders: Vec<Order> = data
        .orders
        .iter()
        .filter(|o| o.created_at >= since && o.created_at <= now)
        .cloned()
        .collect();
    let ids: HashSet<_> = orders.iter().map(|o| o.id).collect();
    let items: Vec<OrderItem> = data
        .items
        .iter()
        .filter(|i| ids.contains(&i.order_id))
        .cloned()
        .collect();
    summary_of(&orders, &items, &data.products)
}

fn summary_of(orders: &[Order], items: &[OrderItem], products: &[Product]) -> FinancialSummary {
    let revenue = total_revenue(orders);
    let cost = total_cost(items, products);
    FinancialSummary {
        revenue,
        cost,
        profit: revenue - cost,
        outstanding: total_outstanding(orders),
        order_count: orders.len(),
        paid_order_count: orders.iter().filter(|o| o.status.is_paid()).count(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use shopledger_core::{
        Order, OrderId, OrderItem, OrderItemId, OrderStatus, Product, ProductId,
    };

    pub fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    pub fn product(id: i64, cost: f64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("produto {id}"),
            quantity: 0,
            cost_price: cost,
            created_at: at(1),
            updated_at: at(1),
        }
    }

    pub fn order(id: i64, total: f64, paid: f64, day: u32) -> Order {
        Order {
            id: OrderId::new(id),
            customer_id: None,
            status: if paid >= total {
                OrderStatus::Paid
            } else {
                OrderStatus::WithCustomer
            },
            notes: String::new(),
            total_amount: total,
            paid_amount: paid,
            created_at: at(day),
            updated_at: at(day),
        }
    }

    pub fn item(id: i64, order: i64, product: i64, quantity: i64, unit_price: f64) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(order),
            product_id: ProductId::new(product),
            quantity,
            unit_price,
            total_price: unit_price * quantity as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::fixtures::*;
    use super::*;

    fn data() -> Dataset {
        Dataset::new(
            vec![product(1, 10.0), product(2, 4.0)],
            vec![order(1, 100.0, 100.0, 2), order(2, 50.0, 20.0, 20), order(3, 30.0, 45.0, 28)],
            vec![item(1, 1, 1, 3, 30.0), item(2, 2, 2, 5, 10.0), item(3, 3, 9, 1, 30.0)],
        )
    }

    #[test]
    fn totals_over_the_full_extent() {
        let summary = summarize(&data());

        assert_eq!(summary.revenue, 165.0);
        assert_eq!(summary.cost, 50.0);
        assert_eq!(summary.profit, 115.0);
        assert_eq!(summary.outstanding, 30.0);
        assert_eq!(summary.order_count, 3);
        assert_eq!(summary.paid_order_count, 2);
        assert_eq!(total_profit(&data()), 115.0);
    }

    #[test]
    fn overpaid_order_contributes_zero_outstanding() {
        let orders = [order(1, 50.0, 80.0, 1)];
        assert_eq!(orders[0].outstanding(), -30.0);
        assert_eq!(total_outstanding(&orders), 0.0);
    }

    #[test]
    fn window_keeps_recent_orders_and_their_items() {
        let recent = windowed(&data(), 10, at(29));

        assert_eq!(recent.order_count, 2);
        assert_eq!(recent.revenue, 65.0);
        assert_eq!(recent.cost, 20.0);
        assert_eq!(recent.outstanding, 30.0);

        let none = windowed(&data(), 0, at(30));
        assert_eq!(none, FinancialSummary::default());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        #[test]
        fn outstanding_is_never_negative(
            amounts in prop::collection::vec((0.0f64..10_000.0, 0.0f64..10_000.0), 0..20)
        ) {
            let orders: Vec<Order> = amounts
                .iter()
                .enumerate()
                .map(|(i, (total, paid))| order(i as i64 + 1, *total, *paid, 1))
                .collect();
            prop_assert!(total_outstanding(&orders) >= 0.0);
        }

        #[test]
        fn profit_is_revenue_minus_cost(
            paid in prop::collection::vec(0.0f64..1_000.0, 1..10),
            quantities in prop::collection::vec(1i64..20, 1..10),
        ) {
            let orders: Vec<Order> = paid
                .iter()
                .enumerate()
                .map(|(i, p)| order(i as i64 + 1, 1_000.0, *p, 1))
                .collect();
            let items: Vec<OrderItem> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| item(i as i64 + 1, 1, 1, *q, 1.0))
                .collect();
            let data = Dataset::new(vec![product(1, 2.5)], orders, items);

            let summary = summarize(&data);
            prop_assert_eq!(summary.profit, summary.revenue - summary.cost);
        }
    }
}
