// storefront/src/web/handlers/payment_handlers.rs

//! Gateway callbacks. These carry no customer identity; the signature is
//! the authentication.

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;

use crate::errors::AppError;
use crate::services::payment::{PaymentCallback, RefundCallback};
use crate::state::AppState;

#[instrument(name = "handler::payment_callback", skip(app_state, body), fields(order_id = %body.order_id))]
pub async fn payment_callback_handler(
  app_state: web::Data<AppState>,
  body: web::Json<PaymentCallback>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.payments.verify_and_capture(body.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "order_id": order.id,
    "order_number": order.order_number,
    "status": order.status,
    "payment_status": order.payment_status,
  })))
}

#[instrument(name = "handler::refund_callback", skip(app_state, body), fields(order_id = %body.order_id))]
pub async fn refund_callback_handler(
  app_state: web::Data<AppState>,
  body: web::Json<RefundCallback>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.payments.settle_refund(body.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({
    "order_id": order.id,
    "order_number": order.order_number,
    "status": order.status,
    "payment_status": order.payment_status,
  })))
}
