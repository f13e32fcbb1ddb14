//! Status enums for orders and checkout.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order fulfillment status as reported by the backend (`estado`).
///
/// Unrecognized values deserialize to [`OrderStatus::Unknown`] so that a new
/// backend status never breaks order history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "enviado")]
    Shipped,
    #[serde(rename = "entregado")]
    Delivered,
    #[serde(rename = "cancelado")]
    Cancelled,
    #[serde(other, rename = "desconocido")]
    Unknown,
}

impl OrderStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the order can still change.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Shipped)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payment method chosen at checkout (`metodoPago`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Credit card (`tarjeta`).
    #[default]
    #[serde(rename = "tarjeta")]
    Card,
    /// `PayPal` (`paypal`).
    Paypal,
    /// Cash on delivery (`efectivo`).
    #[serde(rename = "efectivo")]
    Cash,
}

impl PaymentMethod {
    /// The value the backend expects on the wire.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Card => "tarjeta",
            Self::Paypal => "paypal",
            Self::Cash => "efectivo",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Card => "Credit card",
            Self::Paypal => "PayPal",
            Self::Cash => "Cash",
        })
    }
}

/// Error returned when parsing an unknown payment method.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown payment method {0:?} (expected card, paypal or cash)")]
pub struct UnknownPaymentMethod(String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" | "tarjeta" => Ok(Self::Card),
            "paypal" => Ok(Self::Paypal),
            "cash" | "efectivo" => Ok(Self::Cash),
            _ => Err(UnknownPaymentMethod(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_names() {
        let status: OrderStatus = serde_json::from_str("\"enviado\"").unwrap();
        assert_eq!(status, OrderStatus::Shipped);
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"cancelado\""
        );
    }

    #[test]
    fn test_order_status_unknown_fallback() {
        let status: OrderStatus = serde_json::from_str("\"devuelto\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        assert!(!status.is_open());
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("Card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("efectivo".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_wire() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Card).unwrap(),
            format!("\"{}\"", PaymentMethod::Card.as_wire())
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Paypal).unwrap(),
            "\"paypal\""
        );
    }
}
