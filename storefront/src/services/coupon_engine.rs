// storefront/src/services/coupon_engine.rs

//! Coupon validation and discount computation. Pure functions; the stores
//! call [`validate`] again under lock when an order is placed.

use crate::errors::CouponRejection;
use crate::models::{Coupon, DiscountType};
use crate::services::pricing;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountResult {
  pub coupon_id: Uuid,
  pub code: String,
  pub discount: Decimal,
}

/// Checks `coupon` against a cart, in order: existence and active flag,
/// validity window, minimum order, total usage, per-customer usage.
/// `code` is only used to name the coupon in a `NotFound` rejection.
pub fn validate(
  code: &str,
  coupon: Option<&Coupon>,
  cart_total: Decimal,
  customer_uses: i64,
  now: DateTime<Utc>,
) -> Result<DiscountResult, CouponRejection> {
  let coupon = match coupon {
    Some(c) if c.active => c,
    _ => {
      return Err(CouponRejection::NotFound {
        code: code.to_string(),
      })
    }
  };
  let code = coupon.code.clone();

  if now < coupon.valid_from {
    return Err(CouponRejection::NotYetValid { code });
  }
  if now >= coupon.valid_until {
    return Err(CouponRejection::Expired { code });
  }

  let minimum = coupon.min_order_amount.unwrap_or(Decimal::ZERO);
  if cart_total < minimum {
    return Err(CouponRejection::MinimumOrderNotMet {
      code,
      minimum,
      shortfall: minimum - cart_total,
    });
  }

  if let Some(limit) = coupon.usage_limit {
    if coupon.used_count >= limit {
      return Err(CouponRejection::UsageLimitReached { code });
    }
  }
  if customer_uses >= i64::from(coupon.per_user_limit) {
    return Err(CouponRejection::PerUserLimitReached { code });
  }

  Ok(DiscountResult {
    coupon_id: coupon.id,
    code,
    discount: discount_for(coupon, cart_total),
  })
}

/// Never negative and never more than `cart_total`. Rounded half-up to the
/// currency's minor unit so the order total stays payable.
pub fn discount_for(coupon: &Coupon, cart_total: Decimal) -> Decimal {
  if cart_total <= Decimal::ZERO {
    return Decimal::ZERO;
  }
  let raw = match coupon.discount_type {
    DiscountType::Percentage => {
      let pct = cart_total * coupon.value / Decimal::ONE_HUNDRED;
      match coupon.max_discount_amount {
        Some(cap) => pct.min(cap),
        None => pct,
      }
    }
    DiscountType::Fixed => coupon.value,
  };
  pricing::round_to_minor_unit(raw).min(cart_total).max(Decimal::ZERO)
}
