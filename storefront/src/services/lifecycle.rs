// storefront/src/services/lifecycle.rs

//! Order status state machine. The pure `apply_*` functions decide and mutate
//! an in-memory copy; [`OrderLifecycle`] persists the result with optimistic
//! concurrency and enqueues notifications after the write.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus, TrackingInfo};
use crate::services::notifier::{Notification, NotificationKind, NotificationQueue};
use crate::store::{mutate_order, Mutation, OrderStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Who is asking for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
  Customer(Uuid),
  Admin(Uuid),
  System,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
  pub target: OrderStatus,
  #[serde(default)]
  pub reason: Option<String>,
  #[serde(default)]
  pub tracking: Option<TrackingInfo>,
}

impl TransitionRequest {
  pub fn to(target: OrderStatus) -> Self {
    Self {
      target,
      reason: None,
      tracking: None,
    }
  }
}

/// Targets reachable from `from` through a status request.
pub fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
  use OrderStatus::*;
  match from {
    Pending => &[Confirmed, Cancelled],
    Confirmed => &[Processing, Cancelled],
    Processing => &[Shipped, Cancelled],
    Shipped => &[Delivered],
    Delivered | Cancelled | Refunded => &[],
  }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
  allowed_targets(from).contains(&to)
}

fn default_message(target: OrderStatus) -> &'static str {
  match target {
    OrderStatus::Pending => "Order placed",
    OrderStatus::Confirmed => "Order confirmed",
    OrderStatus::Processing => "Order is being processed",
    OrderStatus::Shipped => "Order shipped",
    OrderStatus::Delivered => "Order delivered",
    OrderStatus::Cancelled => "Order cancelled.",
    OrderStatus::Refunded => "Refund settled",
  }
}

fn check_actor(order: &Order, target: OrderStatus, actor: Actor) -> AppResult<()> {
  let Actor::Customer(customer_id) = actor else {
    return Ok(());
  };
  if order.customer_id != customer_id {
    return Err(AppError::Forbidden("order belongs to another customer".to_string()));
  }
  if target != OrderStatus::Cancelled {
    return Err(AppError::Forbidden("customers may only cancel orders".to_string()));
  }
  if matches!(order.status, OrderStatus::Processing | OrderStatus::Shipped) {
    return Err(AppError::CancellationWindowClosed { status: order.status });
  }
  Ok(())
}

/// Validates and applies one status change to `order`, appending exactly one
/// timeline entry. Leaves `order` untouched on error.
pub fn apply_transition(order: &mut Order, request: &TransitionRequest, actor: Actor, now: DateTime<Utc>) -> AppResult<()> {
  check_actor(order, request.target, actor)?;
  if !can_transition(order.status, request.target) {
    return Err(AppError::IllegalTransition {
      from: order.status,
      to: request.target,
    });
  }

  let base = request
    .reason
    .as_deref()
    .map(str::trim)
    .filter(|r| !r.is_empty())
    .unwrap_or(default_message(request.target))
    .to_string();

  let message = match request.target {
    OrderStatus::Cancelled if order.payment_status == PaymentStatus::Paid && order.total > Decimal::ZERO => {
      order.payment_status = PaymentStatus::Refunded;
      format!(
        "{} Refund of {} {} initiated.",
        base,
        order.currency,
        order.total.normalize()
      )
    }
    OrderStatus::Shipped => {
      if let Some(tracking) = &request.tracking {
        order.tracking = Some(sqlx::types::Json(tracking.clone()));
      }
      base
    }
    OrderStatus::Delivered if order.payment_method == PaymentMethod::CashOnDelivery => {
      order.payment_status = PaymentStatus::Paid;
      base
    }
    _ => base,
  };

  order.status = request.target;
  order.updated_at = now;
  order.push_timeline(request.target, message, now);
  Ok(())
}

/// Records a verified gateway payment. Returns `Unchanged` for a replay.
pub fn capture_payment(order: &mut Order, payment_id: &str, now: DateTime<Utc>) -> AppResult<Mutation> {
  match (order.status, order.payment_status) {
    (_, PaymentStatus::Paid) | (_, PaymentStatus::Refunded) => Ok(Mutation::Unchanged),
    (OrderStatus::Pending, _) => {
      order.payment_status = PaymentStatus::Paid;
      order.status = OrderStatus::Confirmed;
      order.gateway_payment_id = Some(payment_id.to_string());
      order.updated_at = now;
      order.push_timeline(OrderStatus::Confirmed, "Payment received; order confirmed", now);
      Ok(Mutation::Write)
    }
    (OrderStatus::Cancelled, _) => {
      order.payment_status = PaymentStatus::Refunded;
      order.gateway_payment_id = Some(payment_id.to_string());
      order.updated_at = now;
      order.push_timeline(
        OrderStatus::Cancelled,
        format!(
          "Payment received after cancellation. Refund of {} {} initiated.",
          order.currency,
          order.total.normalize()
        ),
        now,
      );
      Ok(Mutation::Write)
    }
    (status @ (OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped), _) => {
      order.payment_status = PaymentStatus::Paid;
      order.gateway_payment_id = Some(payment_id.to_string());
      order.updated_at = now;
      order.push_timeline(status, "Payment received", now);
      Ok(Mutation::Write)
    }
    (status, _) => Err(AppError::IllegalTransition {
      from: status,
      to: OrderStatus::Confirmed,
    }),
  }
}

/// Confirms an order that has nothing left to pay. Idempotent.
pub fn confirm_without_charge(order: &mut Order, now: DateTime<Utc>) -> AppResult<Mutation> {
  if order.total != Decimal::ZERO {
    return Err(AppError::Integrity(format!(
      "order {} owes {} {}",
      order.order_number,
      order.currency,
      order.total.normalize()
    )));
  }
  match (order.status, order.payment_status) {
    (OrderStatus::Confirmed, PaymentStatus::Paid) => Ok(Mutation::Unchanged),
    (OrderStatus::Pending, PaymentStatus::Pending) => {
      order.payment_status = PaymentStatus::Paid;
      order.status = OrderStatus::Confirmed;
      order.updated_at = now;
      order.push_timeline(OrderStatus::Confirmed, "Nothing to pay; order confirmed", now);
      Ok(Mutation::Write)
    }
    (status, _) => Err(AppError::IllegalTransition {
      from: status,
      to: OrderStatus::Confirmed,
    }),
  }
}

/// Moves a cancelled order with a refund owed to `refunded`. Idempotent.
pub fn settle_refund(order: &mut Order, now: DateTime<Utc>) -> AppResult<Mutation> {
  match (order.status, order.payment_status) {
    (OrderStatus::Refunded, _) => Ok(Mutation::Unchanged),
    (OrderStatus::Cancelled, PaymentStatus::Refunded) => {
      order.status = OrderStatus::Refunded;
      order.updated_at = now;
      order.push_timeline(
        OrderStatus::Refunded,
        format!("Refund of {} {} settled.", order.currency, order.total.normalize()),
        now,
      );
      Ok(Mutation::Write)
    }
    (status, _) => Err(AppError::IllegalTransition {
      from: status,
      to: OrderStatus::Refunded,
    }),
  }
}

pub struct OrderLifecycle {
  orders: Arc<dyn OrderStore>,
  notifications: NotificationQueue,
}

impl OrderLifecycle {
  pub fn new(orders: Arc<dyn OrderStore>, notifications: NotificationQueue) -> Self {
    Self { orders, notifications }
  }

  #[instrument(name = "OrderLifecycle::transition", skip(self, request), fields(to_status = %request.target), err(Display))]
  pub async fn transition(&self, order_id: Uuid, request: TransitionRequest, actor: Actor) -> AppResult<Order> {
    let (order, written) = mutate_order(self.orders.as_ref(), order_id, |order| {
      apply_transition(order, &request, actor, Utc::now())?;
      Ok(Mutation::Write)
    })
    .await?;

    if written {
      info!(order_number = %order.order_number, status = %order.status, "Order status changed.");
      if let Some(kind) = NotificationKind::for_status(order.status) {
        self.notifications.enqueue(Notification::for_order(kind, &order));
      }
    }
    Ok(order)
  }
}
