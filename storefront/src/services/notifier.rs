// storefront/src/services/notifier.rs

//! Customer notifications. Producers enqueue on a bounded channel and never
//! wait for delivery; a single worker drains it with bounded retries.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const BASE_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  OrderConfirmed,
  OrderShipped,
  OrderDelivered,
  OrderCancelled,
}

impl NotificationKind {
  /// The notification a status change produces, if any.
  pub fn for_status(status: OrderStatus) -> Option<Self> {
    match status {
      OrderStatus::Confirmed => Some(NotificationKind::OrderConfirmed),
      OrderStatus::Shipped => Some(NotificationKind::OrderShipped),
      OrderStatus::Delivered => Some(NotificationKind::OrderDelivered),
      OrderStatus::Cancelled => Some(NotificationKind::OrderCancelled),
      _ => None,
    }
  }

  fn subject(&self) -> &'static str {
    match self {
      NotificationKind::OrderConfirmed => "Your order is confirmed",
      NotificationKind::OrderShipped => "Your order is on its way",
      NotificationKind::OrderDelivered => "Your order was delivered",
      NotificationKind::OrderCancelled => "Your order was cancelled",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub kind: NotificationKind,
  pub order_id: Uuid,
  pub order_number: String,
  pub customer_id: Uuid,
  pub message: String,
}

impl Notification {
  pub fn for_order(kind: NotificationKind, order: &Order) -> Self {
    let message = order
      .timeline
      .last()
      .map(|entry| entry.message.clone())
      .unwrap_or_default();
    Self {
      kind,
      order_id: order.id,
      order_number: order.order_number.clone(),
      customer_id: order.customer_id,
      message,
    }
  }
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify(&self, notification: &Notification) -> AppResult<()>;
}

/// Stand-in for the email transport: logs the message after a short delay.
pub struct EmailNotifier {
  sender: String,
}

impl EmailNotifier {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into() }
  }
}

#[async_trait]
impl Notifier for EmailNotifier {
  #[instrument(name = "EmailNotifier::notify", skip_all, fields(order_number = %notification.order_number, kind = ?notification.kind))]
  async fn notify(&self, notification: &Notification) -> AppResult<()> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    info!(
      "Simulated email from '{}' to customer {}: '{}' ({})",
      self.sender,
      notification.customer_id,
      notification.kind.subject(),
      notification.message
    );
    Ok(())
  }
}

/// Producer half of the notification channel. Cloning is cheap.
#[derive(Clone)]
pub struct NotificationQueue {
  tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
  /// Queues without waiting. A full or closed channel is logged and dropped.
  pub fn enqueue(&self, notification: Notification) {
    let order_number = notification.order_number.clone();
    if let Err(e) = self.tx.try_send(notification) {
      let reason = match e {
        mpsc::error::TrySendError::Full(_) => "queue full",
        mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
      };
      warn!(%order_number, reason, "Dropping order notification.");
    }
  }
}

/// Starts the dispatcher. The worker exits once every queue handle is dropped.
pub fn spawn_dispatcher(
  notifier: Arc<dyn Notifier>,
  capacity: usize,
  max_attempts: u32,
) -> (NotificationQueue, JoinHandle<()>) {
  let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));
  let handle = tokio::spawn(async move {
    while let Some(notification) = rx.recv().await {
      if let Err(e) = deliver(notifier.as_ref(), &notification, max_attempts.max(1)).await {
        error!(order_number = %notification.order_number, error = %e, "Giving up on order notification.");
      }
    }
    info!("Notification dispatcher stopped.");
  });
  (NotificationQueue { tx }, handle)
}

async fn deliver(notifier: &dyn Notifier, notification: &Notification, max_attempts: u32) -> AppResult<()> {
  let mut attempt = 1;
  loop {
    match notifier.notify(notification).await {
      Ok(()) => return Ok(()),
      Err(e) if attempt < max_attempts => {
        let backoff = BASE_BACKOFF * 2u32.saturating_pow(attempt - 1);
        warn!(order_number = %notification.order_number, attempt, error = %e, ?backoff, "Notification failed; retrying.");
        tokio::time::sleep(backoff).await;
        attempt += 1;
      }
      Err(e) => {
        return Err(AppError::Internal(format!(
          "notification failed after {} attempts: {}",
          attempt, e
        )))
      }
    }
  }
}
