// storefront/src/store/memory.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::coupon::normalize_code;
use crate::models::{Coupon, Order, OrderStatus, PaymentStatus, Product};
use crate::store::{settle, Catalog, CouponStore, OrderStore, PlaceOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
  products: HashMap<Uuid, Product>,
  coupons: HashMap<String, Coupon>,
  coupon_usage: HashMap<(String, Uuid), i64>,
  orders: HashMap<Uuid, Order>,
  order_sequence: i64,
}

/// In-process store. Every operation runs inside one critical section, which
/// gives it the same all-or-nothing behaviour as a database transaction.
#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn upsert_product(&self, product: Product) {
    self.inner.lock().products.insert(product.id, product);
  }

  pub fn product(&self, product_id: Uuid) -> Option<Product> {
    self.inner.lock().products.get(&product_id).cloned()
  }

  pub fn coupon(&self, code: &str) -> Option<Coupon> {
    self.inner.lock().coupons.get(&normalize_code(code)).cloned()
  }

  fn place_order_locked(&self, request: &PlaceOrder) -> AppResult<Order> {
    let mut inner = self.inner.lock();

    let demand = settle::aggregate_demand(&request.lines)?;
    let mut locked_products = HashMap::new();
    for (product_id, requested) in &demand {
      let product = inner.products.get(product_id);
      settle::check_availability(*product_id, product, *requested)?;
      if let Some(product) = product {
        locked_products.insert(*product_id, product.clone());
      }
    }

    let prices = settle::line_prices(&request.lines, &locked_products)?;
    let subtotal = crate::services::pricing::subtotal(&prices);
    let coupon_key = request.coupon_code.as_deref().map(normalize_code);
    let (coupon, uses) = match &coupon_key {
      Some(code) => (
        inner.coupons.get(code),
        inner
          .coupon_usage
          .get(&(code.clone(), request.customer_id))
          .copied()
          .unwrap_or(0),
      ),
      None => (None, 0),
    };
    let discount = settle::redeemable_discount(request, coupon, uses, subtotal)?;

    let order = settle::build_order(request, &locked_products, discount.as_ref(), inner.order_sequence + 1)?;

    // Everything validated; apply the writes.
    inner.order_sequence += 1;
    for (product_id, requested) in &demand {
      if let Some(product) = inner.products.get_mut(product_id) {
        product.stock_quantity -= requested;
        product.updated_at = request.now;
      }
    }
    if let (Some(code), Some(_)) = (&coupon_key, &discount) {
      if let Some(coupon) = inner.coupons.get_mut(code) {
        coupon.used_count += 1;
      }
      *inner
        .coupon_usage
        .entry((code.clone(), request.customer_id))
        .or_insert(0) += 1;
    }
    inner.orders.insert(order.id, order.clone());
    Ok(order)
  }

  fn update_order_locked(&self, order: &Order, expected_version: i64) -> AppResult<Order> {
    let mut inner = self.inner.lock();
    let stored = inner
      .orders
      .get_mut(&order.id)
      .ok_or(AppError::OrderNotFound(order.id))?;
    if stored.version != expected_version {
      return Err(AppError::ConcurrentModification(order.id));
    }
    stored.status = order.status;
    stored.payment_status = order.payment_status;
    stored.payment_session_ref = order.payment_session_ref.clone();
    stored.gateway_payment_id = order.gateway_payment_id.clone();
    stored.tracking = order.tracking.clone();
    stored.timeline = order.timeline.clone();
    stored.version = expected_version + 1;
    stored.updated_at = order.updated_at;
    Ok(stored.clone())
  }

  fn void_order_locked(&self, order_id: Uuid, message: &str, now: DateTime<Utc>) -> AppResult<Order> {
    let mut inner = self.inner.lock();
    let order = inner
      .orders
      .get(&order_id)
      .cloned()
      .ok_or(AppError::OrderNotFound(order_id))?;
    if order.status != OrderStatus::Pending {
      return Err(AppError::IllegalTransition {
        from: order.status,
        to: OrderStatus::Cancelled,
      });
    }

    for (product_id, quantity) in settle::restock_quantities(&order.lines)? {
      if let Some(product) = inner.products.get_mut(&product_id) {
        product.stock_quantity += quantity;
        product.updated_at = now;
      }
    }
    if let Some(code) = &order.coupon_code {
      if let Some(coupon) = inner.coupons.get_mut(code) {
        coupon.used_count = (coupon.used_count - 1).max(0);
      }
      if let Some(uses) = inner.coupon_usage.get_mut(&(code.clone(), order.customer_id)) {
        *uses = (*uses - 1).max(0);
      }
    }

    let stored = inner
      .orders
      .get_mut(&order_id)
      .ok_or(AppError::OrderNotFound(order_id))?;
    stored.status = OrderStatus::Cancelled;
    stored.payment_status = PaymentStatus::Failed;
    stored.push_timeline(OrderStatus::Cancelled, message, now);
    stored.version += 1;
    stored.updated_at = now;
    Ok(stored.clone())
  }
}

#[async_trait]
impl Catalog for MemoryStore {
  async fn resolve_product(&self, product_id: Uuid) -> AppResult<Option<Product>> {
    Ok(self.product(product_id))
  }
}

#[async_trait]
impl CouponStore for MemoryStore {
  async fn find_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
    Ok(self.coupon(code))
  }

  async fn customer_uses(&self, code: &str, customer_id: Uuid) -> AppResult<i64> {
    let inner = self.inner.lock();
    Ok(
      inner
        .coupon_usage
        .get(&(normalize_code(code), customer_id))
        .copied()
        .unwrap_or(0),
    )
  }

  async fn create_coupon(&self, coupon: Coupon) -> AppResult<Coupon> {
    let mut inner = self.inner.lock();
    if inner.coupons.contains_key(&coupon.code) {
      return Err(AppError::CouponAlreadyExists(coupon.code));
    }
    inner.coupons.insert(coupon.code.clone(), coupon.clone());
    Ok(coupon)
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn place_order(&self, request: PlaceOrder) -> AppResult<Order> {
    let order = self.place_order_locked(&request)?;
    event!(Level::DEBUG, order_id = %order.id, order_number = %order.order_number, "Order stored in memory.");
    Ok(order)
  }

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
    Ok(self.inner.lock().orders.get(&order_id).cloned())
  }

  async fn orders_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .inner
      .lock()
      .orders
      .values()
      .filter(|o| o.customer_id == customer_id)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.order_number.cmp(&a.order_number)));
    Ok(orders)
  }

  async fn update_order(&self, order: &Order, expected_version: i64) -> AppResult<Order> {
    self.update_order_locked(order, expected_version)
  }

  async fn void_order(&self, order_id: Uuid, message: &str, now: DateTime<Utc>) -> AppResult<Order> {
    self.void_order_locked(order_id, message, now)
  }
}
