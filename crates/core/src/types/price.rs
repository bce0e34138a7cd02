//! Type-safe price representation using decimal arithmetic.
//!
//! Monetary amounts never touch floating point: a [`Price`] wraps a
//! [`rust_decimal::Decimal`] and maps to `NUMERIC` in `PostgreSQL`.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store currency's standard unit.
///
/// Cart line totals and order totals are computed with [`Price::times`] and
/// [`Sum`], so the arithmetic stays in decimal space end to end.
///
/// # Example
///
/// ```
/// use bramble_core::Price;
/// use rust_decimal::Decimal;
///
/// let unit = Price::new(Decimal::new(1050, 2)); // 10.50
/// assert_eq!(unit.times(2).to_string(), "21.00");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Multiply this unit price by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: i32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Price {
    /// Formats with two decimal places, e.g. `19.99`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2))
    }

    #[test]
    fn line_total_scales_with_quantity() {
        assert_eq!(price(1000).times(2), price(2000));
        assert_eq!(price(533).times(3), price(1599));
        assert_eq!(price(1000).times(0), Price::ZERO);
    }

    #[test]
    fn sums_to_cart_total() {
        let total: Price = [price(1000).times(2), price(500)].into_iter().sum();
        assert_eq!(total, price(2500));
    }

    #[test]
    fn displays_two_decimal_places() {
        assert_eq!(price(1050).to_string(), "10.50");
        assert_eq!(Price::new(Decimal::new(5, 0)).to_string(), "5.00");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_value(price(1234)).expect("serialize");
        let back: Price = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, price(1234));
    }
}
