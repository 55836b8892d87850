// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Order, OrderStatus, PaymentStatus};
use crate::services::lifecycle::{Actor, TransitionRequest};
use crate::state::AppState;
use crate::web::extractors::{AuthenticatedCustomer, RequestActor};

/// List entry; the full projection is served by `GET /orders/{id}`.
#[derive(Debug, Serialize)]
pub struct OrderSummary {
  pub id: Uuid,
  pub order_number: String,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub total: Decimal,
  pub currency: String,
  pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
  fn from(order: &Order) -> Self {
    Self {
      id: order.id,
      order_number: order.order_number.clone(),
      status: order.status,
      payment_status: order.payment_status,
      total: order.total,
      currency: order.currency.clone(),
      created_at: order.created_at,
    }
  }
}

#[instrument(name = "handler::list_orders", skip(app_state, customer), fields(customer_id = %customer.customer_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  customer: AuthenticatedCustomer,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.orders.orders_for_customer(customer.customer_id).await?;
  let summaries: Vec<OrderSummary> = orders.iter().map(OrderSummary::from).collect();
  info!("Listing {} orders", summaries.len());
  Ok(HttpResponse::Ok().json(summaries))
}

#[instrument(name = "handler::get_order", skip(app_state, actor))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  actor: RequestActor,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state
    .orders
    .find_order(order_id)
    .await?
    .ok_or(AppError::OrderNotFound(order_id))?;

  if let Actor::Customer(customer_id) = actor.0 {
    if order.customer_id != customer_id {
      return Err(AppError::Forbidden("order belongs to another customer".to_string()));
    }
  }
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::transition_order", skip(app_state, actor, body), fields(to_status = %body.target))]
pub async fn transition_order_handler(
  app_state: web::Data<AppState>,
  actor: RequestActor,
  path: web::Path<Uuid>,
  body: web::Json<TransitionRequest>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .lifecycle
    .transition(path.into_inner(), body.into_inner(), actor.0)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}
