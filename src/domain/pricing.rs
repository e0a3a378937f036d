//! Prices
//!
//! Arithmetic is decimal-exact and checked: an amount that does not fit is an
//! error, never a panic.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::value_objects::Quantity;
use crate::{Result, ShopError};

/// VAT rate applied to orders (20 %).
pub const VAT_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

/// Largest accepted unit price, 99 999 999.99 (ten digits, two of them decimals).
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Decimal places a unit price may carry.
pub const PRICE_SCALE: u32 = 2;

/// Checks a unit price: not negative, at most [`PRICE_SCALE`] decimals, at most [`MAX_PRICE`].
pub fn check_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO || price > MAX_PRICE || price.normalize().scale() > PRICE_SCALE {
        return Err(ShopError::InvalidPrice);
    }
    Ok(())
}

/// Price of a line: unit price times quantity, exact.
pub fn line_item_price(unit_price: Decimal, quantity: Quantity) -> Result<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity.value())).ok_or_else(out_of_range)
}

/// Sum of line prices.
pub fn total(prices: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    prices.into_iter().try_fold(Decimal::ZERO, |sum, price| sum.checked_add(price).ok_or_else(out_of_range))
}

/// VAT amount and VAT-inclusive price at the standard rate.
pub fn vat(price: Decimal) -> Result<(Decimal, Decimal)> {
    vat_with_rate(price, VAT_RATE)
}

/// VAT amount and VAT-inclusive price at `rate`, unrounded.
pub fn vat_with_rate(price: Decimal, rate: Decimal) -> Result<(Decimal, Decimal)> {
    let vat_amount = price.checked_mul(rate).ok_or_else(out_of_range)?;
    let incl_vat_price = price.checked_add(vat_amount).ok_or_else(out_of_range)?;
    Ok((vat_amount, incl_vat_price))
}

/// Rounds half away from zero to two decimals, as amounts are stored on orders.
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn out_of_range() -> ShopError {
    ShopError::Validation("amount out of range".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vat_round_trip() {
        let (vat_amount, incl) = vat(Decimal::from(100)).unwrap();
        assert_eq!(vat_amount, Decimal::from(20));
        assert_eq!(incl, Decimal::from(120));
    }

    #[test]
    fn test_vat_is_exact() {
        let (vat_amount, incl) = vat(Decimal::new(1999, 2)).unwrap();
        assert_eq!(vat_amount, Decimal::new(3998, 3));
        assert_eq!(incl, Decimal::new(23988, 3));
        assert_eq!(to_cents(vat_amount), Decimal::new(400, 2));
        assert_eq!(to_cents(incl), Decimal::new(2399, 2));
    }

    #[test]
    fn test_vat_custom_rate() {
        let (vat_amount, incl) = vat_with_rate(Decimal::from(50), Decimal::new(55, 3)).unwrap();
        assert_eq!(vat_amount, Decimal::new(275, 2));
        assert_eq!(incl, Decimal::new(5275, 2));
    }

    #[test]
    fn test_line_item_price() {
        let price = line_item_price(Decimal::new(4242, 2), Quantity::new(1000)).unwrap();
        assert_eq!(price, Decimal::from(42420));
    }

    #[test]
    fn test_price_bounds() {
        assert_eq!(MAX_PRICE, Decimal::new(9_999_999_999, 2));
        check_price(Decimal::ZERO).unwrap();
        check_price(MAX_PRICE).unwrap();
        check_price(Decimal::new(1500, 3)).unwrap();
        assert!(matches!(check_price(Decimal::new(-1, 2)), Err(ShopError::InvalidPrice)));
        assert!(matches!(check_price(Decimal::new(1, 3)), Err(ShopError::InvalidPrice)));
        assert!(matches!(check_price(MAX_PRICE + Decimal::new(1, 2)), Err(ShopError::InvalidPrice)));
        assert!(matches!(check_price(Decimal::from_i128_with_scale(10i128.pow(20), 0)), Err(ShopError::InvalidPrice)));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Decimal::MAX;
        assert!(matches!(line_item_price(huge, Quantity::new(1_000_000_000)), Err(ShopError::Validation(_))));
        assert!(matches!(total([huge, huge]), Err(ShopError::Validation(_))));
        assert!(matches!(vat(huge), Err(ShopError::Validation(_))));
        assert_eq!(total([Decimal::ONE, Decimal::from(2)]).unwrap(), Decimal::from(3));
    }

    #[test]
    fn test_largest_line_fits() {
        let price = line_item_price(MAX_PRICE, Quantity::new(u32::MAX)).unwrap();
        assert_eq!(price, MAX_PRICE * Decimal::from(u32::MAX));
    }
}
