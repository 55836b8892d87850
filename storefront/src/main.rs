// storefront/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use std::io;
use std::sync::Arc;
use storefront::config::{AppConfig, StoreBackend};
use storefront::services::gateway::MockGateway;
use storefront::services::notifier::{spawn_dispatcher, EmailNotifier};
use storefront::state::AppState;
use storefront::store::{Catalog, CouponStore, MemoryStore, OrderStore, PgStore};
use storefront::web::configure_app_routes;
use storefront::AppError;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

type Stores = (Arc<dyn Catalog>, Arc<dyn CouponStore>, Arc<dyn OrderStore>);

fn stores<S>(store: Arc<S>) -> Stores
where
  S: Catalog + CouponStore + OrderStore + 'static,
{
  (store.clone(), store.clone(), store)
}

fn startup_error(context: &str, e: AppError) -> io::Error {
  tracing::error!(error = %e, "{}", context);
  io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // RUST_LOG overrides
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting storefront server...");

  let config = Arc::new(AppConfig::from_env().map_err(|e| startup_error("Failed to load configuration", e))?);
  tracing::debug!(?config, "Configuration");

  let (catalog, coupons, orders) = match config.store_backend {
    StoreBackend::Postgres => {
      let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| startup_error("Missing database URL", AppError::Config("DATABASE_URL".to_string())))?;
      let store = PgStore::connect(database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to the database", e))?;
      tracing::info!("Successfully connected to the database.");
      if config.run_migrations {
        store
          .run_migrations()
          .await
          .map_err(|e| startup_error("Failed to run migrations", e))?;
      }
      stores(Arc::new(store))
    }
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory store; data is lost on restart.");
      stores(Arc::new(MemoryStore::new()))
    }
  };

  tracing::warn!("Using the signing mock payment gateway.");
  let gateway = Arc::new(MockGateway::new(
    config.payment_key_id.clone(),
    config.payment_key_secret.clone(),
  ));

  let (notifications, _dispatcher) = spawn_dispatcher(
    Arc::new(EmailNotifier::new(config.notification_sender.clone())),
    config.notification_queue_capacity,
    config.notification_max_attempts,
  );

  let app_state = AppState::new(config.clone(), catalog, coupons, orders, gateway, notifications);

  let server_address = format!("{}:{}", config.server_host, config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
