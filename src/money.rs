//! Conversions between stored minor units and the decimal amounts clients see.
//!
//! Amounts are persisted as `i64` hundredths so no arithmetic on them ever goes through
//! floating point.

use rust_decimal::Decimal;

pub const SCALE: u32 = 2;

pub fn to_decimal(minor: i64) -> Decimal {
    Decimal::new(minor, SCALE)
}

/// Exact conversion to minor units. `None` when the amount carries non-zero digits past the
/// second fractional place or does not fit in an `i64`.
pub fn to_minor(amount: Decimal) -> Option<i64> {
    let normalized = amount.normalize();
    if normalized.scale() > SCALE {
        return None;
    }
    let mut scaled = normalized;
    scaled.rescale(SCALE);
    i64::try_from(scaled.mantissa()).ok()
}

/// Sum of minor-unit amounts; `None` on overflow.
pub fn sum_minor<I: IntoIterator<Item = i64>>(amounts: I) -> Option<i64> {
    amounts
        .into_iter()
        .try_fold(0i64, |acc, amount| acc.checked_add(amount))
}
