// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::checkout_pipeline::{self, CheckoutRequest};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedCustomer;

#[instrument(
  name = "handler::checkout",
  skip(app_state, customer, body),
  fields(customer_id = %customer.customer_id, lines = body.lines.len())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  customer: AuthenticatedCustomer,
  body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  info!("Checkout attempt by customer {}", customer.customer_id);
  let outcome = checkout_pipeline::create_order(app_state.get_ref(), customer.customer_id, body.into_inner()).await?;
  Ok(HttpResponse::Created().json(outcome))
}

#[instrument(name = "handler::checkout_quote", skip(app_state, customer, body), fields(customer_id = %customer.customer_id))]
pub async fn quote_handler(
  app_state: web::Data<AppState>,
  customer: AuthenticatedCustomer,
  body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let quote = checkout_pipeline::quote(app_state.get_ref(), customer.customer_id, body.into_inner()).await?;
  Ok(HttpResponse::Ok().json(quote))
}
