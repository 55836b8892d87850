// storefront/src/store/mod.rs

//! Persistence seams. `PgStore` is the production backend; `MemoryStore`
//! has the same transactional semantics behind one mutex.

pub mod memory;
pub mod postgres;
pub mod settle;

use crate::config::PricingRules;
use crate::errors::{AppError, Result as AppResult};
use crate::models::{CartLine, Coupon, Order, PaymentMethod, Product, ShippingAddress};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{event, Level};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Catalog: Send + Sync {
  async fn resolve_product(&self, product_id: Uuid) -> AppResult<Option<Product>>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
  /// Case-insensitive lookup.
  async fn find_coupon(&self, code: &str) -> AppResult<Option<Coupon>>;

  async fn customer_uses(&self, code: &str, customer_id: Uuid) -> AppResult<i64>;

  /// Fails with `CouponAlreadyExists` on a duplicate code.
  async fn create_coupon(&self, coupon: Coupon) -> AppResult<Coupon>;
}

/// Everything needed to place an order in one transaction.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
  pub customer_id: Uuid,
  pub lines: Vec<CartLine>,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub coupon_code: Option<String>,
  pub notes: Option<String>,
  pub rules: PricingRules,
  pub now: DateTime<Utc>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Atomically: checks and decrements stock, re-validates and redeems the
  /// coupon, prices the cart from the prices read under lock and inserts the
  /// order as pending with its first timeline entry. Nothing is written on error.
  async fn place_order(&self, request: PlaceOrder) -> AppResult<Order>;

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>>;

  /// Newest first.
  async fn orders_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>>;

  /// Writes the mutable fields of `order` if the stored version is still
  /// `expected_version`, bumping the version. A stale write fails with
  /// `ConcurrentModification`.
  async fn update_order(&self, order: &Order, expected_version: i64) -> AppResult<Order>;

  /// Cancels a pending order that could not be paid for. Restores stock in
  /// product-id order, releases the coupon redemption, marks the payment
  /// failed and appends `message` to the timeline.
  async fn void_order(&self, order_id: Uuid, message: &str, now: DateTime<Utc>) -> AppResult<Order>;
}

/// Outcome of a mutation closure passed to [`mutate_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
  Write,
  Unchanged,
}

/// Loads the order, applies `apply` to a copy and writes it back with an
/// optimistic version check. A conflict reloads and re-applies once; a second
/// conflict is returned. Returns the resulting order and whether it was written.
pub async fn mutate_order<F>(orders: &dyn OrderStore, order_id: Uuid, mut apply: F) -> AppResult<(Order, bool)>
where
  F: FnMut(&mut Order) -> AppResult<Mutation> + Send,
{
  let mut attempt = 0;
  loop {
    attempt += 1;
    let current = orders
      .find_order(order_id)
      .await?
      .ok_or(AppError::OrderNotFound(order_id))?;

    let mut updated = current.clone();
    if apply(&mut updated)? == Mutation::Unchanged {
      return Ok((current, false));
    }

    match orders.update_order(&updated, current.version).await {
      Ok(stored) => return Ok((stored, true)),
      Err(AppError::ConcurrentModification(id)) if attempt < 2 => {
        event!(Level::WARN, order_id = %id, "Stale order version; reloading and retrying once.");
      }
      Err(e) => return Err(e),
    }
  }
}
