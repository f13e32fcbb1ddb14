//! Order history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OrderId, OrderLineId};
use super::price::Price;
use super::product::Product;
use super::quantity::Quantity;
use super::status::{OrderStatus, PaymentMethod};

/// A placed order (`pedido`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "estado", default)]
    pub status: OrderStatus,
    pub total: Price,
    #[serde(rename = "direccionEnvio")]
    pub shipping_address: String,
    #[serde(rename = "metodoPago")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

/// One line of an order, priced at the moment of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    #[serde(rename = "cantidad")]
    pub quantity: Quantity,
    #[serde(rename = "precio")]
    pub unit_price: Price,
    /// The product may have been deleted since the order was placed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

impl OrderLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

impl Order {
    /// Total number of units across all lines.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity.get())).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_order_history_entry() {
        let json = r#"{
            "id": 12,
            "estado": "entregado",
            "total": "45.00",
            "direccionEnvio": "Calle 1",
            "metodoPago": "efectivo",
            "createdAt": "2024-05-01T10:00:00.000Z",
            "User": {"nombre": "Ana"},
            "items": [
                {"id": 1, "cantidad": 2, "precio": "15.00", "product": null},
                {"id": 2, "cantidad": "1", "precio": 15}
            ]
        }"#;

        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.payment_method, PaymentMethod::Cash);
        assert_eq!(order.total_units(), 3);
        assert_eq!(order.items[0].line_total().to_string(), "$30.00");
        assert!(order.created_at.is_some());
    }
}
