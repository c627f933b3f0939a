//! Base-unit to human-unit conversion for payment currencies.
//!
//! All arithmetic is arbitrary-precision decimal; scaling by a power of ten
//! always terminates, so no precision is lost on large base-unit integers.

use std::str::FromStr;

use anyhow::{Context, Result};
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;

use crate::types::Currency;

fn scale(currency: Currency) -> BigDecimal {
    BigDecimal::from(BigInt::from(10u32).pow(currency.decimals()))
}

/// Parses a decimal amount string.
pub(crate) fn parse_decimal(text: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(text.trim()).with_context(|| format!("invalid decimal amount {text:?}"))
}

/// Converts a base-unit integer amount into human units.
pub fn to_human_units(currency: Currency, base_amount: &str) -> Result<BigDecimal> {
    let amount = parse_decimal(base_amount)?;
    Ok(amount / scale(currency))
}

/// Scales a human-unit amount back into base units.
pub fn to_base_units(currency: Currency, human_amount: &BigDecimal) -> BigDecimal {
    (human_amount * scale(currency)).normalized()
}
