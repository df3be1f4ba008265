use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{CustomerId, OrderId, OrderItemId, ProductId};

/// Order status label.
///
/// Any status may follow any other; there is no transition graph. Labels
/// outside the three known ones (found in older stores or typed into a
/// spreadsheet) are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Goods are with the customer, payment pending.
    WithCustomer,
    Paid,
    /// Placed to order ("encomenda"), not yet delivered.
    Order,
    Other(String),
}

impl OrderStatus {
    /// Stored code.
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::WithCustomer => "with_customer",
            OrderStatus::Paid => "paid",
            OrderStatus::Order => "order",
            OrderStatus::Other(s) => s,
        }
    }

    /// Display label used by the shop's screens.
    pub fn label(&self) -> &str {
        match self {
            OrderStatus::WithCustomer => "Com Cliente",
            OrderStatus::Paid => "Pago",
            OrderStatus::Order => "Encomenda",
            OrderStatus::Other(s) => s,
        }
    }

    /// Parse a stored code or a display label (case-insensitive).
    ///
    /// Blank input means the default status.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "with_customer" | "com cliente" => OrderStatus::WithCustomer,
            "paid" | "pago" => OrderStatus::Paid,
            "order" | "encomenda" => OrderStatus::Order,
            _ => OrderStatus::Other(trimmed.to_string()),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::WithCustomer
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        OrderStatus::parse(&value)
    }
}

impl From<OrderStatus> for String {
    fn from(value: OrderStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Persisted order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Not enforced by storage; may be unset or dangling.
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub notes: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// `total_amount - paid_amount`. Negative when the customer overpaid.
    pub fn outstanding(&self) -> f64 {
        self.total_amount - self.paid_amount
    }

    /// Outstanding balance as reported: overpayment counts as nothing owed.
    pub fn outstanding_clamped(&self) -> f64 {
        self.outstanding().max(0.0)
    }

    pub fn is_overpaid(&self) -> bool {
        self.paid_amount > self.total_amount
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }
}

/// Persisted order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// Not enforced by storage; may be dangling after an unchecked delete.
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
}

/// Payload for `Ledger::create_order`. The total starts at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub notes: String,
    pub paid_amount: f64,
}

impl NewOrder {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_amount("paid amount", self.paid_amount)
    }
}

/// Payload for one order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
}

impl NewOrderItem {
    /// Line with `total_price = unit_price * quantity`.
    pub fn priced(product_id: ProductId, quantity: i64, unit_price: f64) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            total_price: unit_price * quantity as f64,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        ensure_amount("unit price", self.unit_price)?;
        ensure_amount("item total", self.total_price)
    }
}

fn ensure_amount(what: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!("{what} must be a non-negative number")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn order(total: f64, paid: f64) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            customer_id: None,
            status: OrderStatus::WithCustomer,
            notes: String::new(),
            total_amount: total,
            paid_amount: paid,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parses_codes_and_labels() {
        assert_eq!(OrderStatus::parse("paid"), OrderStatus::Paid);
        assert_eq!(OrderStatus::parse(" Pago "), OrderStatus::Paid);
        assert_eq!(OrderStatus::parse("ENCOMENDA"), OrderStatus::Order);
        assert_eq!(OrderStatus::parse("com cliente"), OrderStatus::WithCustomer);
        assert_eq!(OrderStatus::parse(""), OrderStatus::WithCustomer);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = OrderStatus::parse("pending");
        assert_eq!(status, OrderStatus::Other("pending".to_string()));
        assert_eq!(status.as_str(), "pending");
    }

    #[test]
    fn status_serializes_as_code() {
        let json = serde_json::to_string(&OrderStatus::WithCustomer).unwrap();
        assert_eq!(json, "\"with_customer\"");
        let back: OrderStatus = serde_json::from_str("\"order\"").unwrap();
        assert_eq!(back, OrderStatus::Order);
    }

    #[test]
    fn outstanding_may_be_negative_but_clamped_is_not() {
        let o = order(50.0, 80.0);
        assert_eq!(o.outstanding(), -30.0);
        assert_eq!(o.outstanding_clamped(), 0.0);
        assert!(o.is_overpaid());

        let o = order(100.0, 30.0);
        assert_eq!(o.outstanding_clamped(), 70.0);
    }

    #[test]
    fn item_requires_positive_quantity() {
        let item = NewOrderItem::priced(ProductId::new(1), 0, 10.0);
        assert_eq!(
            item.validate().unwrap_err(),
            DomainError::validation("quantity must be positive")
        );
    }

    #[test]
    fn priced_item_multiplies_quantity() {
        let item = NewOrderItem::priced(ProductId::new(1), 3, 12.5);
        assert_eq!(item.total_price, 37.5);
        assert!(item.validate().is_ok());
    }

    proptest! {
        #[test]
        fn parsing_a_stored_code_gives_the_same_status(raw in ".*") {
            let status = OrderStatus::parse(&raw);
            prop_assert_eq!(OrderStatus::parse(status.as_str()), status);
        }

        #[test]
        fn labels_parse_back_in_any_case(
            status in prop_oneof![
                Just(OrderStatus::WithCustomer),
                Just(OrderStatus::Paid),
                Just(OrderStatus::Order),
            ],
            upper in any::<bool>(),
        ) {
            let label = if upper { status.label().to_uppercase() } else { status.label().to_lowercase() };
            prop_assert_eq!(OrderStatus::parse(&label), status);
        }
    }
}
