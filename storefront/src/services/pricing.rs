// storefront/src/services/pricing.rs

use crate::config::PricingRules;
use crate::errors::{AppError, Result as AppResult};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Decimal places of the currency's minor unit. Every stored amount fits it.
pub const MINOR_UNIT_DP: u32 = 2;

/// Rounds half-up to the currency's minor unit.
pub fn round_to_minor_unit(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// A server-priced quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrice {
  pub unit_price: Decimal,
  pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
  pub subtotal: Decimal,
  pub discount: Decimal,
  pub shipping: Decimal,
  pub tax: Decimal,
  pub total: Decimal,
  pub currency: String,
}

pub fn subtotal(lines: &[LinePrice]) -> Decimal {
  lines
    .iter()
    .map(|l| l.unit_price * Decimal::from(l.quantity))
    .sum()
}

/// Prices a cart. Tax applies to the discounted subtotal and is rounded half-up
/// to a whole currency unit; shipping is free at or above the threshold.
pub fn compute(lines: &[LinePrice], discount: Decimal, rules: &PricingRules) -> AppResult<PriceBreakdown> {
  if lines.iter().any(|l| l.unit_price < Decimal::ZERO || l.quantity < 1) {
    return Err(AppError::PriceComputation("negative price or non-positive quantity".to_string()));
  }
  if discount < Decimal::ZERO {
    return Err(AppError::PriceComputation(format!("negative discount {}", discount)));
  }

  let subtotal = subtotal(lines);
  if discount > subtotal {
    return Err(AppError::PriceComputation(format!(
      "discount {} exceeds subtotal {}",
      discount, subtotal
    )));
  }

  let shipping = if subtotal >= rules.free_shipping_threshold {
    Decimal::ZERO
  } else {
    rules.flat_shipping_rate
  };
  let taxable = subtotal - discount;
  let tax = (taxable * rules.tax_rate).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
  if tax < Decimal::ZERO {
    return Err(AppError::PriceComputation(format!("negative tax {}", tax)));
  }

  let total = subtotal - discount + shipping + tax;
  if total < Decimal::ZERO {
    return Err(AppError::PriceComputation(format!("negative total {}", total)));
  }

  Ok(PriceBreakdown {
    subtotal,
    discount,
    shipping,
    tax,
    total,
    currency: rules.currency.clone(),
  })
}
