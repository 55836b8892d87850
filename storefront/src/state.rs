// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines;
use crate::services::gateway::PaymentGateway;
use crate::services::lifecycle::OrderLifecycle;
use crate::services::notifier::NotificationQueue;
use crate::services::payment::PaymentCoordinator;
use crate::store::{Catalog, CouponStore, OrderStore};
use flowline::Flows;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub flows: Arc<Flows<AppError>>,
  pub config: Arc<AppConfig>,
  pub catalog: Arc<dyn Catalog>,
  pub coupons: Arc<dyn CouponStore>,
  pub orders: Arc<dyn OrderStore>,
  pub payments: Arc<PaymentCoordinator>,
  pub lifecycle: Arc<OrderLifecycle>,
}

impl AppState {
  /// Wires the services together and registers the pipelines.
  pub fn new(
    config: Arc<AppConfig>,
    catalog: Arc<dyn Catalog>,
    coupons: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: NotificationQueue,
  ) -> Self {
    let payments = Arc::new(PaymentCoordinator::new(
      orders.clone(),
      gateway,
      notifications.clone(),
      config.payment_timeout,
    ));
    let lifecycle = Arc::new(OrderLifecycle::new(orders.clone(), notifications));

    let flows = Arc::new(Flows::<AppError>::new());
    pipelines::register_all_pipelines(&flows);

    Self {
      flows,
      config,
      catalog,
      coupons,
      orders,
      payments,
      lifecycle,
    }
  }
}
