use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub totalprice: Decimal,
    /// Set once on insert.
    #[serde(with = "time::serde::rfc3339")]
    pub ordertime: OffsetDateTime,
    pub isrecommended: bool,
    pub aiexplanation: String,
}

impl Order {
    /// `"🤖 Order #12 - John @ Thai Spice"`, without the badge when the order
    /// was not recommended.
    pub fn label(&self, customer_firstname: &str, restaurant_name: &str) -> String {
        let badge = if self.isrecommended { "🤖 " } else { "" };
        format!(
            "{badge}Order #{} - {customer_firstname} @ {restaurant_name}",
            self.id
        )
    }
}

/// Writable order fields. `ordertime` is absent on purpose: it cannot be written.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(alias = "customer")]
    pub customer_id: i64,
    #[serde(alias = "restaurant")]
    pub restaurant_id: i64,
    #[serde(default)]
    pub totalprice: Decimal,
    #[serde(default)]
    pub isrecommended: bool,
    #[serde(default)]
    pub aiexplanation: String,
}

impl From<&Order> for NewOrder {
    fn from(o: &Order) -> Self {
        Self {
            customer_id: o.customer_id,
            restaurant_id: o.restaurant_id,
            totalprice: o.totalprice,
            isrecommended: o.isrecommended,
            aiexplanation: o.aiexplanation.clone(),
        }
    }
}

pub fn subtotal(price: Decimal, quantity: i32) -> Decimal {
    price * Decimal::from(quantity)
}

/// An order line joined with the item it references.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItemLine {
    pub id: i64,
    pub order_id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub item_name: String,
    pub item_price: Decimal,
}

impl OrderItemLine {
    pub fn subtotal(&self) -> Decimal {
        subtotal(self.item_price, self.quantity)
    }
}

impl fmt::Display for OrderItemLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x {}", self.quantity, self.item_name)
    }
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    #[serde(alias = "order")]
    pub order_id: i64,
    #[serde(alias = "item")]
    pub item_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// How many times a tag showed up in a customer's orders.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerPreferenceTag {
    pub id: i64,
    pub customer_id: i64,
    pub tag_id: i64,
    pub count: i32,
}

impl CustomerPreferenceTag {
    pub fn label(&self, customer_firstname: &str, tag_name: &str) -> String {
        format!("{customer_firstname} - {tag_name} ({}x)", self.count)
    }
}

fn default_count() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPreferenceTag {
    #[serde(alias = "customer")]
    pub customer_id: i64,
    #[serde(alias = "tag")]
    pub tag_id: i64,
    #[serde(default = "default_count")]
    pub count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(isrecommended: bool) -> Order {
        Order {
            id: 12,
            customer_id: 1,
            restaurant_id: 2,
            totalprice: Decimal::ZERO,
            ordertime: OffsetDateTime::UNIX_EPOCH,
            isrecommended,
            aiexplanation: String::new(),
        }
    }

    #[test]
    fn subtotal_is_exact_decimal_product() {
        let line = OrderItemLine {
            id: 1,
            order_id: 1,
            item_id: 1,
            quantity: 3,
            item_name: "Green Curry".into(),
            item_price: Decimal::new(1299, 2),
        };
        assert_eq!(line.subtotal(), Decimal::new(3897, 2));
        assert_eq!(line.subtotal().to_string(), "38.97");
        assert_eq!(subtotal(Decimal::new(999, 2), 0), Decimal::ZERO);
        assert_eq!(line.to_string(), "3x Green Curry");
    }

    #[test]
    fn order_label_marks_recommendations() {
        assert_eq!(
            order(true).label("John", "Thai Spice"),
            "🤖 Order #12 - John @ Thai Spice"
        );
        assert_eq!(
            order(false).label("John", "Thai Spice"),
            "Order #12 - John @ Thai Spice"
        );
    }

    #[test]
    fn new_order_ignores_ordertime() {
        let o: NewOrder = serde_json::from_value(serde_json::json!({
            "customer": 1,
            "restaurant": 2,
            "ordertime": "2000-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(o.customer_id, 1);
        assert_eq!(o.totalprice, Decimal::ZERO);
        assert!(!o.isrecommended);
    }

    #[test]
    fn preference_defaults_to_one_occurrence() {
        let p: NewPreferenceTag =
            serde_json::from_value(serde_json::json!({ "customer": 1, "tag": 9 })).unwrap();
        assert_eq!(p.count, 1);
        let row = CustomerPreferenceTag {
            id: 1,
            customer_id: 1,
            tag_id: 9,
            count: 4,
        };
        assert_eq!(row.label("John", "Spicy"), "John - Spicy (4x)");
    }
}
