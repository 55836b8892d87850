// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use storefront::config::AppConfig;
use storefront::errors::Result as AppResult;
use storefront::models::{
  CartLine, Coupon, DiscountType, NewCoupon, Order, PaymentMethod, Product, ShippingAddress,
};
use storefront::pipelines::checkout_pipeline::CheckoutRequest;
use storefront::services::gateway::{payment_message, MockGateway};
use storefront::services::notifier::{spawn_dispatcher, Notification, NotificationKind, Notifier};
use storefront::services::payment::PaymentCallback;
use storefront::state::AppState;
use storefront::store::{CouponStore, MemoryStore, OrderStore};
use tracing::Level;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test_secret";
pub const TEST_KEY_ID: &str = "test_key";

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// Records every notification it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
  pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
  pub fn kinds_for(&self, order_id: Uuid) -> Vec<NotificationKind> {
    self
      .sent
      .lock()
      .iter()
      .filter(|n| n.order_id == order_id)
      .map(|n| n.kind)
      .collect()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn notify(&self, notification: &Notification) -> AppResult<()> {
    self.sent.lock().push(notification.clone());
    Ok(())
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub gateway: Arc<MockGateway>,
  pub notifier: Arc<RecordingNotifier>,
}

pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
  let overrides: Vec<(String, String)> = overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
  AppConfig::from_lookup(move |name| {
    if let Some((_, v)) = overrides.iter().find(|(k, _)| k == name) {
      return Some(v.clone());
    }
    match name {
      "STORE_BACKEND" => Some("memory".to_string()),
      "PAYMENT_KEY_ID" => Some(TEST_KEY_ID.to_string()),
      "PAYMENT_KEY_SECRET" => Some(TEST_SECRET.to_string()),
      "PAYMENT_TIMEOUT_MS" => Some("200".to_string()),
      _ => None,
    }
  })
  .expect("test configuration is valid")
}

/// Builds the application over the in-memory store. Must run inside a tokio runtime.
pub fn spawn_app() -> TestApp {
  spawn_app_with(&[], None)
}

/// Like [`spawn_app`], with configuration overrides and an optional order store
/// wrapping the memory store.
pub fn spawn_app_with(
  overrides: &[(&str, &str)],
  wrap_orders: Option<&dyn Fn(Arc<MemoryStore>) -> Arc<dyn OrderStore>>,
) -> TestApp {
  setup_tracing();
  let config = Arc::new(test_config(overrides));
  let store = Arc::new(MemoryStore::new());
  let gateway = Arc::new(MockGateway::new(TEST_KEY_ID, TEST_SECRET).with_latency(Duration::ZERO));
  let notifier = Arc::new(RecordingNotifier::default());
  let (notifications, _worker) = spawn_dispatcher(notifier.clone(), 64, 3);

  let orders: Arc<dyn OrderStore> = match wrap_orders {
    Some(wrap) => wrap(store.clone()),
    None => store.clone(),
  };
  let state = AppState::new(
    config,
    store.clone(),
    store.clone(),
    orders,
    gateway.clone(),
    notifications,
  );
  TestApp {
    state,
    store,
    gateway,
    notifier,
  }
}

impl TestApp {
  pub fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> Uuid {
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      name: name.to_string(),
      price,
      stock_quantity: stock,
      active: true,
      created_at: now,
      updated_at: now,
    };
    let id = product.id;
    self.store.upsert_product(product);
    id
  }

  pub fn stock_of(&self, product_id: Uuid) -> i32 {
    self.store.product(product_id).map(|p| p.stock_quantity).unwrap_or(-1)
  }

  pub async fn seed_coupon(&self, new_coupon: NewCoupon) -> Coupon {
    let coupon = new_coupon.into_coupon(Utc::now()).expect("valid coupon");
    self.store.create_coupon(coupon).await.expect("coupon stored")
  }

  pub async fn order(&self, order_id: Uuid) -> Order {
    self
      .store
      .find_order(order_id)
      .await
      .expect("store readable")
      .expect("order exists")
  }

  /// A callback signed the way the gateway signs it.
  pub fn signed_callback(&self, order_id: Uuid, session_ref: &str, payment_id: &str) -> PaymentCallback {
    PaymentCallback {
      order_id,
      session_ref: session_ref.to_string(),
      payment_id: payment_id.to_string(),
      signature: self.gateway.sign(&payment_message(session_ref, payment_id)).expect("signable"),
    }
  }

  /// Waits for the dispatcher to deliver `count` notifications for the order.
  pub async fn wait_for_notifications(&self, order_id: Uuid, count: usize) -> Vec<NotificationKind> {
    for _ in 0..50 {
      let kinds = self.notifier.kinds_for(order_id);
      if kinds.len() >= count {
        return kinds;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    self.notifier.kinds_for(order_id)
  }
}

pub fn address() -> ShippingAddress {
  ShippingAddress {
    full_name: "Asha Rao".to_string(),
    phone: "+91 98765 43210".to_string(),
    line1: "12 MG Road".to_string(),
    line2: None,
    city: "Bengaluru".to_string(),
    state: "Karnataka".to_string(),
    postal_code: "560001".to_string(),
    country: "IN".to_string(),
  }
}

pub fn line(product_id: Uuid, quantity: i32) -> CartLine {
  CartLine {
    product_id,
    quantity,
    unit_price: None,
    variant: None,
    customization: None,
  }
}

pub fn checkout_request(lines: Vec<CartLine>, payment_method: PaymentMethod, coupon_code: Option<&str>) -> CheckoutRequest {
  CheckoutRequest {
    lines,
    shipping_address: address(),
    payment_method,
    coupon_code: coupon_code.map(String::from),
    notes: None,
  }
}

pub fn percentage_coupon(code: &str, value: Decimal, cap: Option<Decimal>) -> NewCoupon {
  NewCoupon {
    code: code.to_string(),
    discount_type: DiscountType::Percentage,
    value,
    min_order_amount: None,
    max_discount_amount: cap,
    usage_limit: None,
    per_user_limit: None,
    valid_from: Utc::now() - ChronoDuration::days(1),
    valid_until: Utc::now() + ChronoDuration::days(30),
    active: true,
  }
}

pub fn fixed_coupon(code: &str, value: Decimal) -> NewCoupon {
  NewCoupon {
    discount_type: DiscountType::Fixed,
    value,
    ..percentage_coupon(code, value, None)
  }
}
