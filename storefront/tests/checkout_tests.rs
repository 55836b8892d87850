// tests/checkout_tests.rs
mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use storefront::errors::{AppError, CouponRejection, Result as AppResult};
use storefront::models::{
  CartLine, Customization, Order, OrderStatus, PaymentMethod, PaymentStatus, VariantSelection,
};
use storefront::pipelines::checkout_pipeline::{create_order, quote};
use storefront::services::gateway::MockBehavior;
use storefront::services::lifecycle::{Actor, TransitionRequest};
use storefront::services::notifier::NotificationKind;
use storefront::store::{MemoryStore, OrderStore, PlaceOrder};
use uuid::Uuid;

/// Delegates to the memory store but cannot void orders.
struct UnvoidableOrders {
  inner: Arc<MemoryStore>,
}

#[async_trait]
impl OrderStore for UnvoidableOrders {
  async fn place_order(&self, request: PlaceOrder) -> AppResult<Order> {
    self.inner.place_order(request).await
  }

  async fn find_order(&self, order_id: Uuid) -> AppResult<Option<Order>> {
    self.inner.find_order(order_id).await
  }

  async fn orders_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
    self.inner.orders_for_customer(customer_id).await
  }

  async fn update_order(&self, order: &Order, expected_version: i64) -> AppResult<Order> {
    self.inner.update_order(order, expected_version).await
  }

  async fn void_order(&self, _order_id: Uuid, _message: &str, _now: DateTime<Utc>) -> AppResult<Order> {
    Err(AppError::Internal("store unavailable".to_string()))
  }
}

#[tokio::test]
async fn test_online_checkout_with_coupon_prices_and_opens_session() {
  let app = spawn_app();
  let product = app.seed_product("Ceramic Mug", dec!(500), 10);
  app.seed_coupon(percentage_coupon("save10", dec!(10), None)).await;
  let customer = Uuid::new_v4();

  let outcome = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 2)], PaymentMethod::Online, Some("SAVE10")),
  )
  .await
  .unwrap();

  assert_eq!(outcome.total, dec!(1062));
  assert_eq!(outcome.currency, "INR");
  assert!(outcome.order_number.starts_with("ORD-"));
  let payment = outcome.payment.expect("online checkout returns payment instructions");
  assert_eq!(payment.amount_minor, 106200);
  assert_eq!(payment.key_id, TEST_KEY_ID);

  let order = app.order(outcome.order_id).await;
  assert_eq!(order.subtotal, dec!(1000));
  assert_eq!(order.discount, dec!(100));
  assert_eq!(order.shipping, dec!(0));
  assert_eq!(order.tax, dec!(162));
  assert_eq!(order.total, dec!(1062));
  assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.payment_status, PaymentStatus::Pending);
  assert_eq!(order.payment_session_ref.as_deref(), Some(payment.session_ref.as_str()));
  assert_eq!(order.timeline.len(), 1);
  assert_eq!(order.timeline[0].status, OrderStatus::Pending);
  assert_eq!(order.timeline[0].message, "Order placed");
  assert_eq!(order.lines[0].product_name, "Ceramic Mug");
  assert_eq!(order.lines[0].line_total, dec!(1000));

  assert_eq!(app.stock_of(product), 8);
  assert_eq!(app.store.coupon("save10").unwrap().used_count, 1);
}

#[tokio::test]
async fn test_flat_shipping_below_threshold() {
  let app = spawn_app_with(&[("FREE_SHIPPING_THRESHOLD", "1500")], None);
  let product = app.seed_product("Ceramic Mug", dec!(500), 10);

  let outcome = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 2)], PaymentMethod::CashOnDelivery, None),
  )
  .await
  .unwrap();

  let order = app.order(outcome.order_id).await;
  assert_eq!(order.subtotal, dec!(1000));
  assert_eq!(order.discount, dec!(0));
  assert_eq!(order.shipping, dec!(99));
  assert_eq!(order.tax, dec!(180));
  assert_eq!(order.total, dec!(1279));
}

#[tokio::test]
async fn test_cash_on_delivery_has_no_payment_session() {
  let app = spawn_app();
  let product = app.seed_product("Notebook", dec!(250), 5);

  let outcome = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, None),
  )
  .await
  .unwrap();

  assert!(outcome.payment.is_none());
  let order = app.order(outcome.order_id).await;
  assert_eq!(order.payment_method, PaymentMethod::CashOnDelivery);
  assert!(order.payment_session_ref.is_none());
  assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_order_numbers_are_sequential() {
  let app = spawn_app();
  let product = app.seed_product("Pen", dec!(20), 10);
  let customer = Uuid::new_v4();

  let first = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, None),
  )
  .await
  .unwrap();
  let second = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, None),
  )
  .await
  .unwrap();

  assert_eq!(first.order_number, "ORD-000001");
  assert_eq!(second.order_number, "ORD-000002");
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
  let app = spawn_app();
  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, AppError::EmptyCart));
}

#[tokio::test]
async fn test_invalid_line_shape_reports_field() {
  let app = spawn_app();
  let product = app.seed_product("Tote", dec!(300), 5);

  let mut bad_quantity = line(product, 0);
  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![bad_quantity.clone()], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  match err {
    AppError::Validation { field, .. } => assert_eq!(field, "lines[0].quantity"),
    other => panic!("expected validation error, got {:?}", other),
  }

  bad_quantity.quantity = 1;
  let with_bad_image = CartLine {
    customization: Some(Customization {
      text: Some("Happy birthday".to_string()),
      reference_images: vec!["ftp://example.com/a.png".to_string()],
      notes: None,
    }),
    variant: Some(VariantSelection {
      name: "size".to_string(),
      value: "M".to_string(),
    }),
    ..bad_quantity
  };
  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 1), with_bad_image], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  match err {
    AppError::Validation { field, .. } => assert_eq!(field, "lines[1].customization.reference_images[0]"),
    other => panic!("expected validation error, got {:?}", other),
  }
  assert_eq!(app.stock_of(product), 5);
}

#[tokio::test]
async fn test_unknown_product_is_unavailable() {
  let app = spawn_app();
  let missing = Uuid::new_v4();
  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(missing, 1)], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, AppError::ProductUnavailable { product_id } if product_id == missing));
}

#[tokio::test]
async fn test_stock_is_summed_across_lines_of_the_same_product() {
  let app = spawn_app();
  let product = app.seed_product("Poster", dec!(150), 3);

  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 2), line(product, 2)], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  match err {
    AppError::InsufficientStock {
      product_name,
      requested,
      available,
      ..
    } => {
      assert_eq!(product_name, "Poster");
      assert_eq!(requested, 4);
      assert_eq!(available, 3);
    }
    other => panic!("expected insufficient stock, got {:?}", other),
  }
  assert_eq!(app.stock_of(product), 3);
}

#[tokio::test]
async fn test_rejected_coupon_fails_checkout_without_side_effects() {
  let app = spawn_app();
  let product = app.seed_product("Lamp", dec!(400), 5);
  let mut min_order = percentage_coupon("BIG", dec!(20), None);
  min_order.min_order_amount = Some(dec!(1000));
  app.seed_coupon(min_order).await;

  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 1)], PaymentMethod::Online, Some("big")),
  )
  .await
  .unwrap_err();
  match err {
    AppError::Coupon(CouponRejection::MinimumOrderNotMet { shortfall, .. }) => assert_eq!(shortfall, dec!(600)),
    other => panic!("expected minimum order rejection, got {:?}", other),
  }
  assert_eq!(app.stock_of(product), 5);
  assert_eq!(app.store.coupon("BIG").unwrap().used_count, 0);
}

#[tokio::test]
async fn test_gateway_failure_voids_the_order() {
  let app = spawn_app();
  let product = app.seed_product("Kettle", dec!(800), 4);
  app.seed_coupon(fixed_coupon("FLAT50", dec!(50))).await;
  app.gateway.set_behavior(MockBehavior::Fail);
  let customer = Uuid::new_v4();

  let err = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 2)], PaymentMethod::Online, Some("FLAT50")),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, AppError::PaymentGateway { retryable: true, .. }));
  assert!(err.is_retryable());

  let orders = app.store.orders_for_customer(customer).await.unwrap();
  assert_eq!(orders.len(), 1);
  let voided = &orders[0];
  assert_eq!(voided.status, OrderStatus::Cancelled);
  assert_eq!(voided.payment_status, PaymentStatus::Failed);
  assert_eq!(voided.timeline.len(), 2);
  assert!(voided.timeline[1].message.contains("payment could not be initiated"));
  assert_eq!(app.stock_of(product), 4);
  assert_eq!(app.store.coupon("FLAT50").unwrap().used_count, 0);
}

#[tokio::test]
async fn test_gateway_timeout_voids_the_order() {
  let app = spawn_app_with(&[("PAYMENT_TIMEOUT_MS", "50")], None);
  let product = app.seed_product("Kettle", dec!(800), 4);
  app.gateway.set_behavior(MockBehavior::Hang);
  let customer = Uuid::new_v4();

  let err = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, AppError::PaymentGatewayTimeout));

  let orders = app.store.orders_for_customer(customer).await.unwrap();
  assert_eq!(orders[0].status, OrderStatus::Cancelled);
  assert_eq!(orders[0].payment_status, PaymentStatus::Failed);
  assert_eq!(app.stock_of(product), 4);
}

#[tokio::test]
async fn test_failed_void_is_reported_not_swallowed() {
  let wrap = |inner: Arc<MemoryStore>| -> Arc<dyn OrderStore> { Arc::new(UnvoidableOrders { inner }) };
  let app = spawn_app_with(&[], Some(&wrap));
  let product = app.seed_product("Kettle", dec!(800), 4);
  app.gateway.set_behavior(MockBehavior::Fail);
  let customer = Uuid::new_v4();

  let err = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::Online, None),
  )
  .await
  .unwrap_err();
  match &err {
    AppError::Integrity(message) => {
      assert!(message.contains("still pending"));
      assert!(message.contains("store unavailable"));
    }
    other => panic!("expected an integrity error, got {:?}", other),
  }
  assert!(!err.is_retryable());

  let orders = app.store.orders_for_customer(customer).await.unwrap();
  assert_eq!(orders[0].status, OrderStatus::Pending);
  assert_eq!(app.stock_of(product), 3);
}

#[tokio::test]
async fn test_oversized_quantities_are_rejected_before_stock_moves() {
  let app = spawn_app();
  let product = app.seed_product("Sticker", dec!(5), 10);

  let err = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, i32::MAX), line(product, 2)], PaymentMethod::CashOnDelivery, None),
  )
  .await
  .unwrap_err();
  match err {
    AppError::Validation { field, .. } => assert_eq!(field, "lines[0].quantity"),
    other => panic!("expected a validation error, got {:?}", other),
  }
  assert_eq!(app.stock_of(product), 10);
}

#[tokio::test]
async fn test_fractional_percentage_coupon_keeps_order_payable() {
  let app = spawn_app();
  let product = app.seed_product("Bookmark", dec!(101), 10);
  app.seed_coupon(percentage_coupon("ODD", dec!(12.5), None)).await;

  let outcome = create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 1)], PaymentMethod::Online, Some("ODD")),
  )
  .await
  .unwrap();

  assert_eq!(outcome.total, dec!(203.37));
  assert_eq!(outcome.payment.expect("payment instructions").amount_minor, 20337);
  let order = app.order(outcome.order_id).await;
  assert_eq!(order.discount, dec!(12.63));
  assert_eq!(order.status, OrderStatus::Pending);
  assert!(order.totals_consistent());
  assert_eq!(app.stock_of(product), 9);
}

#[tokio::test]
async fn test_fully_discounted_online_order_is_confirmed_without_charge() {
  let app = spawn_app();
  let product = app.seed_product("Gift Card Sleeve", dec!(1000), 5);
  app.seed_coupon(percentage_coupon("FREE", dec!(100), None)).await;
  let customer = Uuid::new_v4();

  let outcome = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::Online, Some("FREE")),
  )
  .await
  .unwrap();

  assert_eq!(outcome.total, Decimal::ZERO);
  assert!(outcome.payment.is_none());
  let order = app.order(outcome.order_id).await;
  assert_eq!(order.status, OrderStatus::Confirmed);
  assert_eq!(order.payment_status, PaymentStatus::Paid);
  assert!(order.payment_session_ref.is_none());
  assert_eq!(order.timeline.len(), 2);
  assert_eq!(app.stock_of(product), 4);
  assert_eq!(
    app.wait_for_notifications(order.id, 1).await,
    vec![NotificationKind::OrderConfirmed]
  );

  // Nothing was charged, so cancelling owes no refund.
  let cancelled = app
    .state
    .lifecycle
    .transition(order.id, TransitionRequest::to(OrderStatus::Cancelled), Actor::Customer(customer))
    .await
    .unwrap();
  assert_eq!(cancelled.payment_status, PaymentStatus::Paid);
  assert!(!cancelled.timeline.last().unwrap().message.contains("Refund"));
}

#[tokio::test]
async fn test_quote_prices_without_persisting() {
  let app = spawn_app();
  let product = app.seed_product("Ceramic Mug", dec!(500), 10);
  app.seed_coupon(percentage_coupon("SAVE10", dec!(10), None)).await;
  let customer = Uuid::new_v4();

  let quoted = quote(
    &app.state,
    customer,
    checkout_request(vec![line(product, 2)], PaymentMethod::Online, Some(" save10 ")),
  )
  .await
  .unwrap();

  assert_eq!(quoted.breakdown.total, dec!(1062));
  assert_eq!(quoted.breakdown.discount, dec!(100));
  assert_eq!(quoted.coupon_code.as_deref(), Some("SAVE10"));
  assert!(app.store.orders_for_customer(customer).await.unwrap().is_empty());
  assert_eq!(app.stock_of(product), 10);
  assert_eq!(app.store.coupon("SAVE10").unwrap().used_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_exactly_one_checkout() {
  let app = spawn_app();
  let product = app.seed_product("Limited Print", dec!(1200), 1);

  let attempts: Vec<_> = (0..2)
    .map(|_| {
      let state = app.state.clone();
      tokio::spawn(async move {
        create_order(
          &state,
          Uuid::new_v4(),
          checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, None),
        )
        .await
      })
    })
    .collect();

  let mut succeeded = 0;
  let mut out_of_stock = 0;
  for attempt in attempts {
    match attempt.await.unwrap() {
      Ok(_) => succeeded += 1,
      Err(AppError::InsufficientStock { .. }) => out_of_stock += 1,
      Err(other) => panic!("unexpected error: {:?}", other),
    }
  }
  assert_eq!(succeeded, 1);
  assert_eq!(out_of_stock, 1);
  assert_eq!(app.stock_of(product), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_use_coupon_is_redeemed_once() {
  let app = spawn_app();
  let product = app.seed_product("Frame", dec!(600), 10);
  let mut single_use = fixed_coupon("ONCE", dec!(100));
  single_use.usage_limit = Some(1);
  app.seed_coupon(single_use).await;

  let attempts: Vec<_> = (0..4)
    .map(|_| {
      let state = app.state.clone();
      tokio::spawn(async move {
        create_order(
          &state,
          Uuid::new_v4(),
          checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, Some("ONCE")),
        )
        .await
      })
    })
    .collect();

  let mut with_coupon = 0;
  for attempt in attempts {
    match attempt.await.unwrap() {
      Ok(outcome) => {
        let order = app.order(outcome.order_id).await;
        assert_eq!(order.coupon_code.as_deref(), Some("ONCE"));
        with_coupon += 1;
      }
      Err(AppError::Coupon(CouponRejection::UsageLimitReached { .. })) => {}
      Err(other) => panic!("unexpected error: {:?}", other),
    }
  }
  assert_eq!(with_coupon, 1);
  assert_eq!(app.store.coupon("ONCE").unwrap().used_count, 1);
  assert_eq!(app.stock_of(product), 9);
}

#[tokio::test]
async fn test_per_customer_limit_applies_across_orders() {
  let app = spawn_app();
  let product = app.seed_product("Frame", dec!(600), 10);
  app.seed_coupon(fixed_coupon("WELCOME", dec!(100))).await;
  let customer = Uuid::new_v4();

  create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, Some("WELCOME")),
  )
  .await
  .unwrap();

  let err = create_order(
    &app.state,
    customer,
    checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, Some("WELCOME")),
  )
  .await
  .unwrap_err();
  assert!(matches!(err, AppError::Coupon(CouponRejection::PerUserLimitReached { .. })));

  // A different customer can still use it.
  create_order(
    &app.state,
    Uuid::new_v4(),
    checkout_request(vec![line(product, 1)], PaymentMethod::CashOnDelivery, Some("WELCOME")),
  )
  .await
  .unwrap();
}
