// storefront/src/services/payment.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderStatus};
use crate::services::gateway::{payment_message, refund_message, GatewaySession, PaymentGateway};
use crate::services::lifecycle;
use crate::services::notifier::{Notification, NotificationKind, NotificationQueue};
use crate::store::{mutate_order, Mutation, OrderStore};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Signed notice from the gateway that a payment was captured.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallback {
  pub order_id: Uuid,
  pub session_ref: String,
  pub payment_id: String,
  pub signature: String,
}

/// Signed notice from the gateway that a refund was paid out.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundCallback {
  pub order_id: Uuid,
  pub payment_id: String,
  pub refund_id: String,
  pub signature: String,
}

/// Converts a major-unit amount to the gateway's minor units.
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
  let minor = amount * Decimal::ONE_HUNDRED;
  if minor.fract() != Decimal::ZERO {
    return Err(AppError::Integrity(format!("amount {} has sub-minor precision", amount)));
  }
  minor
    .to_i64()
    .ok_or_else(|| AppError::Integrity(format!("amount {} out of range", amount)))
}

pub struct PaymentCoordinator {
  orders: Arc<dyn OrderStore>,
  gateway: Arc<dyn PaymentGateway>,
  notifications: NotificationQueue,
  timeout: Duration,
}

impl PaymentCoordinator {
  pub fn new(
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: NotificationQueue,
    timeout: Duration,
  ) -> Self {
    Self {
      orders,
      gateway,
      notifications,
      timeout,
    }
  }

  pub fn key_id(&self) -> &str {
    self.gateway.key_id()
  }

  /// Opens a gateway session for the order's exact total and records its
  /// reference on the order.
  #[instrument(name = "PaymentCoordinator::create_session", skip(self), err(Display))]
  pub async fn create_session(&self, order_id: Uuid, amount: Decimal, receipt: &str) -> AppResult<GatewaySession> {
    let order = self
      .orders
      .find_order(order_id)
      .await?
      .ok_or(AppError::OrderNotFound(order_id))?;
    if amount != order.total {
      return Err(AppError::Integrity(format!(
        "session amount {} does not match order total {}",
        amount, order.total
      )));
    }
    let amount_minor = to_minor_units(order.total)?;

    let session = tokio::time::timeout(
      self.timeout,
      self.gateway.create_session(amount_minor, &order.currency, receipt),
    )
    .await
    .map_err(|_| {
      warn!(order_number = %order.order_number, timeout = ?self.timeout, "Gateway session request timed out.");
      AppError::PaymentGatewayTimeout
    })??;

    let session_ref = session.session_ref.clone();
    mutate_order(self.orders.as_ref(), order_id, |order| {
      if order.payment_session_ref.as_deref() == Some(session_ref.as_str()) {
        return Ok(Mutation::Unchanged);
      }
      order.payment_session_ref = Some(session_ref.clone());
      order.updated_at = Utc::now();
      Ok(Mutation::Write)
    })
    .await?;

    info!(order_number = %order.order_number, session_ref = %session.session_ref, "Payment session opened.");
    Ok(session)
  }

  /// Verifies a payment callback and confirms the order. A replayed callback
  /// returns the order unchanged.
  #[instrument(name = "PaymentCoordinator::verify_and_capture", skip_all, fields(order_id = %callback.order_id), err(Display))]
  pub async fn verify_and_capture(&self, callback: PaymentCallback) -> AppResult<Order> {
    let order = self
      .orders
      .find_order(callback.order_id)
      .await?
      .ok_or(AppError::OrderNotFound(callback.order_id))?;

    let message = payment_message(&callback.session_ref, &callback.payment_id);
    let signature_ok = self.gateway.verify_signature(&message, &callback.signature);
    let session_ok = order.payment_session_ref.as_deref() == Some(callback.session_ref.as_str());
    if !signature_ok || !session_ok {
      warn!(
        target: "storefront::security",
        order_id = %callback.order_id,
        signature_ok,
        session_ok,
        "Rejected payment callback."
      );
      return Err(AppError::PaymentVerificationFailed(
        "signature or session reference mismatch".to_string(),
      ));
    }

    let payment_id = callback.payment_id.clone();
    let (order, written) = mutate_order(self.orders.as_ref(), callback.order_id, |order| {
      lifecycle::capture_payment(order, &payment_id, Utc::now())
    })
    .await?;

    if written {
      info!(order_number = %order.order_number, status = %order.status, "Payment captured.");
      if order.status == OrderStatus::Confirmed {
        self.notifications.enqueue(Notification::for_order(NotificationKind::OrderConfirmed, &order));
      }
    } else {
      info!(order_number = %order.order_number, "Payment callback replayed; nothing to do.");
    }
    Ok(order)
  }

  /// Confirms a fully discounted online order without opening a gateway
  /// session.
  #[instrument(name = "PaymentCoordinator::confirm_without_charge", skip(self), err(Display))]
  pub async fn confirm_without_charge(&self, order_id: Uuid) -> AppResult<Order> {
    let (order, written) = mutate_order(self.orders.as_ref(), order_id, |order| {
      lifecycle::confirm_without_charge(order, Utc::now())
    })
    .await?;
    if written {
      info!(order_number = %order.order_number, "Nothing to charge; order confirmed.");
      self.notifications.enqueue(Notification::for_order(NotificationKind::OrderConfirmed, &order));
    }
    Ok(order)
  }

  /// Verifies a refund callback and moves the order to `refunded`.
  #[instrument(name = "PaymentCoordinator::settle_refund", skip_all, fields(order_id = %callback.order_id), err(Display))]
  pub async fn settle_refund(&self, callback: RefundCallback) -> AppResult<Order> {
    let order = self
      .orders
      .find_order(callback.order_id)
      .await?
      .ok_or(AppError::OrderNotFound(callback.order_id))?;

    let message = refund_message(&callback.payment_id, &callback.refund_id);
    let signature_ok = self.gateway.verify_signature(&message, &callback.signature);
    let payment_ok = order.gateway_payment_id.as_deref() == Some(callback.payment_id.as_str());
    if !signature_ok || !payment_ok {
      warn!(
        target: "storefront::security",
        order_id = %callback.order_id,
        signature_ok,
        payment_ok,
        "Rejected refund callback."
      );
      return Err(AppError::PaymentVerificationFailed(
        "signature or payment id mismatch".to_string(),
      ));
    }

    let (order, written) = mutate_order(self.orders.as_ref(), callback.order_id, |order| {
      lifecycle::settle_refund(order, Utc::now())
    })
    .await?;
    if written {
      info!(order_number = %order.order_number, refund_id = %callback.refund_id, "Refund settled.");
    }
    Ok(order)
  }
}
