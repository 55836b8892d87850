// storefront/src/store/postgres.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::coupon::normalize_code;
use crate::models::{Coupon, Order, OrderStatus, PaymentStatus, Product};
use crate::store::{settle, Catalog, CouponStore, OrderStore, PlaceOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{event, instrument, Level};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str = "id, name, price, stock_quantity, active, created_at, updated_at";

const COUPON_COLUMNS: &str = "id, code, discount_type, value, min_order_amount, max_discount_amount, usage_limit, \
   per_user_limit, valid_from, valid_until, active, used_count, created_at";

const ORDER_COLUMNS: &str = "id, order_number, customer_id, lines, shipping_address, subtotal, discount, coupon_code, \
   shipping, tax, total, currency, payment_method, payment_status, status, payment_session_ref, gateway_payment_id, \
   tracking, timeline, notes, version, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> AppResult<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    Ok(Self::new(pool))
  }

  pub async fn run_migrations(&self) -> AppResult<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
    event!(Level::INFO, "Database migrations applied.");
    Ok(())
  }

  /// Decrements stock for every product, in id order, or fails naming the
  /// first product that cannot be served. Returns the rows as read under lock.
  async fn reserve_stock(
    tx: &mut Transaction<'_, Postgres>,
    demand: &[(Uuid, i32)],
    now: DateTime<Utc>,
  ) -> AppResult<HashMap<Uuid, Product>> {
    let mut products = HashMap::with_capacity(demand.len());
    for (product_id, requested) in demand {
      let reserved = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET stock_quantity = stock_quantity - $2, updated_at = $3 \
         WHERE id = $1 AND active AND stock_quantity >= $2 RETURNING {}",
        PRODUCT_COLUMNS
      ))
      .bind(product_id)
      .bind(requested)
      .bind(now)
      .fetch_optional(&mut **tx)
      .await?;

      match reserved {
        Some(product) => {
          products.insert(*product_id, product);
        }
        None => {
          let current = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?;
          settle::check_availability(*product_id, current.as_ref(), *requested)?;
          // Availability passed on re-read only if stock changed in between.
          return Err(AppError::ConcurrentModification(*product_id));
        }
      }
    }
    Ok(products)
  }

  async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> AppResult<()> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, customer_id, lines, shipping_address, subtotal, discount, coupon_code, \
       shipping, tax, total, currency, payment_method, payment_status, status, payment_session_ref, \
       gateway_payment_id, tracking, timeline, notes, version, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.customer_id)
    .bind(&order.lines)
    .bind(&order.shipping_address)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(&order.coupon_code)
    .bind(order.shipping)
    .bind(order.tax)
    .bind(order.total)
    .bind(&order.currency)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.status)
    .bind(&order.payment_session_ref)
    .bind(&order.gateway_payment_id)
    .bind(&order.tracking)
    .bind(&order.timeline)
    .bind(&order.notes)
    .bind(order.version)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
  }
}

#[async_trait]
impl Catalog for PgStore {
  async fn resolve_product(&self, product_id: Uuid) -> AppResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(product)
  }
}

#[async_trait]
impl CouponStore for PgStore {
  async fn find_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS))
      .bind(normalize_code(code))
      .fetch_optional(&self.pool)
      .await?;
    Ok(coupon)
  }

  async fn customer_uses(&self, code: &str, customer_id: Uuid) -> AppResult<i64> {
    let uses: Option<i64> =
      sqlx::query_scalar("SELECT uses FROM coupon_usages WHERE coupon_code = $1 AND customer_id = $2")
        .bind(normalize_code(code))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
    Ok(uses.unwrap_or(0))
  }

  async fn create_coupon(&self, coupon: Coupon) -> AppResult<Coupon> {
    let inserted = sqlx::query_as::<_, Coupon>(&format!(
      "INSERT INTO coupons ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
       ON CONFLICT (code) DO NOTHING RETURNING {cols}",
      cols = COUPON_COLUMNS
    ))
    .bind(coupon.id)
    .bind(&coupon.code)
    .bind(coupon.discount_type)
    .bind(coupon.value)
    .bind(coupon.min_order_amount)
    .bind(coupon.max_discount_amount)
    .bind(coupon.usage_limit)
    .bind(coupon.per_user_limit)
    .bind(coupon.valid_from)
    .bind(coupon.valid_until)
    .bind(coupon.active)
    .bind(coupon.used_count)
    .bind(coupon.created_at)
    .fetch_optional(&self.pool)
    .await?;
    inserted.ok_or(AppError::CouponAlreadyExists(coupon.code))
  }
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "PgStore::place_order", skip_all, fields(customer_id = %request.customer_id), err)]
  async fn place_order(&self, request: PlaceOrder) -> AppResult<Order> {
    let mut tx = self.pool.begin().await?;

    let demand = settle::aggregate_demand(&request.lines)?;
    let products = Self::reserve_stock(&mut tx, &demand, request.now).await?;
    let prices = settle::line_prices(&request.lines, &products)?;
    let subtotal = crate::services::pricing::subtotal(&prices);

    let coupon_code = request.coupon_code.as_deref().map(normalize_code);
    let (coupon, uses) = match &coupon_code {
      Some(code) => {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
          "SELECT {} FROM coupons WHERE code = $1 FOR UPDATE",
          COUPON_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;
        let uses: Option<i64> =
          sqlx::query_scalar("SELECT uses FROM coupon_usages WHERE coupon_code = $1 AND customer_id = $2")
            .bind(code)
            .bind(request.customer_id)
            .fetch_optional(&mut *tx)
            .await?;
        (coupon, uses.unwrap_or(0))
      }
      None => (None, 0),
    };
    let discount = settle::redeemable_discount(&request, coupon.as_ref(), uses, subtotal)?;

    let sequence: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
      .fetch_one(&mut *tx)
      .await?;
    let order = settle::build_order(&request, &products, discount.as_ref(), sequence)?;

    if let Some(redeemed) = &discount {
      sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
        .bind(redeemed.coupon_id)
        .execute(&mut *tx)
        .await?;
      sqlx::query(
        "INSERT INTO coupon_usages (coupon_code, customer_id, uses) VALUES ($1, $2, 1) \
         ON CONFLICT (coupon_code, customer_id) DO UPDATE SET uses = coupon_usages.uses + 1",
      )
      .bind(&redeemed.code)
      .bind(request.customer_id)
      .execute(&mut *tx)
      .await?;
    }

    Self::insert_order(&mut tx, &order).await?;
    tx.commit().await?;

    event!(Level::INFO, order_id = %order.id, order_number = %order.order_number, total = %order.total, "Order placed.");
    Ok(order)
  }

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(order)
  }

  async fn orders_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
      "SELECT {} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC, order_number DESC",
      ORDER_COLUMNS
    ))
    .bind(customer_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  async fn update_order(&self, order: &Order, expected_version: i64) -> AppResult<Order> {
    let updated = sqlx::query_as::<_, Order>(&format!(
      "UPDATE orders SET status = $3, payment_status = $4, payment_session_ref = $5, gateway_payment_id = $6, \
       tracking = $7, timeline = $8, updated_at = $9, version = version + 1 \
       WHERE id = $1 AND version = $2 RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(expected_version)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.payment_session_ref)
    .bind(&order.gateway_payment_id)
    .bind(&order.tracking)
    .bind(&order.timeline)
    .bind(order.updated_at)
    .fetch_optional(&self.pool)
    .await?;

    match updated {
      Some(order) => Ok(order),
      None => match self.find_order(order.id).await? {
        Some(_) => Err(AppError::ConcurrentModification(order.id)),
        None => Err(AppError::OrderNotFound(order.id)),
      },
    }
  }

  #[instrument(name = "PgStore::void_order", skip(self, message), err)]
  async fn void_order(&self, order_id: Uuid, message: &str, now: DateTime<Utc>) -> AppResult<Order> {
    let mut tx = self.pool.begin().await?;

    let mut order = sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or(AppError::OrderNotFound(order_id))?;
    if order.status != OrderStatus::Pending {
      return Err(AppError::IllegalTransition {
        from: order.status,
        to: OrderStatus::Cancelled,
      });
    }

    for (product_id, quantity) in settle::restock_quantities(&order.lines)? {
      sqlx::query("UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = $3 WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    if let Some(code) = &order.coupon_code {
      sqlx::query("UPDATE coupons SET used_count = GREATEST(used_count - 1, 0) WHERE code = $1")
        .bind(code)
        .execute(&mut *tx)
        .await?;
      sqlx::query(
        "UPDATE coupon_usages SET uses = GREATEST(uses - 1, 0) WHERE coupon_code = $1 AND customer_id = $2",
      )
      .bind(code)
      .bind(order.customer_id)
      .execute(&mut *tx)
      .await?;
    }

    order.status = OrderStatus::Cancelled;
    order.payment_status = PaymentStatus::Failed;
    order.push_timeline(OrderStatus::Cancelled, message, now);
    let voided = sqlx::query_as::<_, Order>(&format!(
      "UPDATE orders SET status = $2, payment_status = $3, timeline = $4, updated_at = $5, version = version + 1 \
       WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(&order.timeline)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(voided)
  }
}
