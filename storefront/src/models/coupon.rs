// storefront/src/models/coupon.rs

use crate::errors::{AppError, Result as AppResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "discount_type_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
  Percentage,
  Fixed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Coupon {
  pub id: Uuid,
  /// Always upper case.
  pub code: String,
  pub discount_type: DiscountType,
  pub value: Decimal,
  pub min_order_amount: Option<Decimal>,
  pub max_discount_amount: Option<Decimal>,
  pub usage_limit: Option<i32>,
  pub per_user_limit: i32,
  pub valid_from: DateTime<Utc>,
  pub valid_until: DateTime<Utc>,
  pub active: bool,
  pub used_count: i32,
  pub created_at: DateTime<Utc>,
}

pub fn normalize_code(code: &str) -> String {
  code.trim().to_uppercase()
}

/// Admin payload for creating a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
  pub code: String,
  pub discount_type: DiscountType,
  pub value: Decimal,
  #[serde(default)]
  pub min_order_amount: Option<Decimal>,
  #[serde(default)]
  pub max_discount_amount: Option<Decimal>,
  #[serde(default)]
  pub usage_limit: Option<i32>,
  #[serde(default)]
  pub per_user_limit: Option<i32>,
  pub valid_from: DateTime<Utc>,
  pub valid_until: DateTime<Utc>,
  #[serde(default = "default_active")]
  pub active: bool,
}

fn default_active() -> bool {
  true
}

impl NewCoupon {
  /// Checks the coupon invariants and builds the stored form.
  pub fn into_coupon(self, now: DateTime<Utc>) -> AppResult<Coupon> {
    let code = normalize_code(&self.code);
    if code.is_empty() || code.len() > 64 {
      return Err(AppError::InvalidCoupon("code must be 1 to 64 characters".to_string()));
    }
    match self.discount_type {
      DiscountType::Percentage => {
        if self.value <= Decimal::ZERO || self.value > Decimal::ONE_HUNDRED {
          return Err(AppError::InvalidCoupon(
            "percentage value must be greater than 0 and at most 100".to_string(),
          ));
        }
      }
      DiscountType::Fixed => {
        if self.value <= Decimal::ZERO {
          return Err(AppError::InvalidCoupon("fixed value must be greater than 0".to_string()));
        }
        if self.max_discount_amount.is_some() {
          return Err(AppError::InvalidCoupon(
            "a discount cap only applies to percentage coupons".to_string(),
          ));
        }
      }
    }
    if self.valid_from >= self.valid_until {
      return Err(AppError::InvalidCoupon("valid_from must be before valid_until".to_string()));
    }
    if self.min_order_amount.is_some_and(|m| m < Decimal::ZERO) {
      return Err(AppError::InvalidCoupon("min_order_amount must not be negative".to_string()));
    }
    if self.max_discount_amount.is_some_and(|m| m <= Decimal::ZERO) {
      return Err(AppError::InvalidCoupon("max_discount_amount must be positive".to_string()));
    }
    if self.usage_limit.is_some_and(|l| l < 1) {
      return Err(AppError::InvalidCoupon("usage_limit must be at least 1".to_string()));
    }
    let per_user_limit = self.per_user_limit.unwrap_or(1);
    if per_user_limit < 1 {
      return Err(AppError::InvalidCoupon("per_user_limit must be at least 1".to_string()));
    }

    Ok(Coupon {
      id: Uuid::new_v4(),
      code,
      discount_type: self.discount_type,
      value: self.value,
      min_order_amount: self.min_order_amount,
      max_discount_amount: self.max_discount_amount,
      usage_limit: self.usage_limit,
      per_user_limit,
      valid_from: self.valid_from,
      valid_until: self.valid_until,
      active: self.active,
      used_count: 0,
      created_at: now,
    })
  }
}
