// storefront/src/web/handlers/coupon_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::NewCoupon;
use crate::services::coupon_engine;
use crate::state::AppState;
use crate::web::extractors::{AdminUser, AuthenticatedCustomer};

#[derive(Debug, Deserialize)]
pub struct CouponPreviewRequest {
  pub code: String,
  pub cart_total: Decimal,
}

/// Runs the coupon checks for the caller without redeeming anything.
#[instrument(name = "handler::preview_coupon", skip(app_state, customer, body), fields(customer_id = %customer.customer_id))]
pub async fn preview_coupon_handler(
  app_state: web::Data<AppState>,
  customer: AuthenticatedCustomer,
  body: web::Json<CouponPreviewRequest>,
) -> Result<HttpResponse, AppError> {
  let CouponPreviewRequest { code, cart_total } = body.into_inner();
  if code.trim().is_empty() {
    return Err(AppError::validation("code", "must not be blank"));
  }
  if cart_total < Decimal::ZERO {
    return Err(AppError::validation("cart_total", "must not be negative"));
  }

  let coupon = app_state.coupons.find_coupon(&code).await?;
  let uses = app_state.coupons.customer_uses(&code, customer.customer_id).await?;
  let result = coupon_engine::validate(code.trim(), coupon.as_ref(), cart_total, uses, Utc::now())?;
  Ok(HttpResponse::Ok().json(result))
}

#[instrument(name = "handler::create_coupon", skip(app_state, admin, body), fields(admin_id = %admin.admin_id))]
pub async fn create_coupon_handler(
  app_state: web::Data<AppState>,
  admin: AdminUser,
  body: web::Json<NewCoupon>,
) -> Result<HttpResponse, AppError> {
  let coupon = body.into_inner().into_coupon(Utc::now())?;
  let coupon = app_state.coupons.create_coupon(coupon).await?;
  info!(code = %coupon.code, "Coupon created.");
  Ok(HttpResponse::Created().json(coupon))
}
