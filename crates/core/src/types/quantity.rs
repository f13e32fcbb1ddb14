//! Cart line quantity.

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing a [`Quantity`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantities start at one.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// The value does not fit in a cart line.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// Number of units of one product in a cart line.
///
/// Always at least 1: a line that would drop to zero is removed instead.
///
/// ```
/// use tienda_core::{Quantity, QuantityError};
///
/// assert_eq!(Quantity::new(3).map(Quantity::get), Ok(3));
/// assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive(0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Validate a user-supplied quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for values below 1 and
    /// [`QuantityError::TooLarge`] for values that overflow `u32`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::NotPositive(value));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge(value))
    }

    /// Get the number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Combine two quantities of the same product, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(QuantityVisitor)
    }
}

struct QuantityVisitor;

impl Visitor<'_> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a positive integer or integer string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(QuantityError::TooLarge(i64::MAX)))?;
        Quantity::new(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Quantity::new(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.fract() != 0.0 || !v.is_finite() {
            return Err(E::invalid_value(de::Unexpected::Float(v), &self));
        }
        #[allow(clippy::cast_possible_truncation)] // integral and finite, checked above
        Quantity::new(v as i64).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let parsed = v
            .trim()
            .parse::<i64>()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))?;
        Quantity::new(parsed).map_err(E::custom)
    }
}
