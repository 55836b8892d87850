// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

/// Inputs of the pricing calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRules {
  pub currency: String,
  pub tax_rate: Decimal,
  pub free_shipping_threshold: Decimal,
  pub flat_shipping_rate: Decimal,
}

impl Default for PricingRules {
  fn default() -> Self {
    Self {
      currency: "INR".to_string(),
      tax_rate: dec!(0.18),
      free_shipping_threshold: dec!(999),
      flat_shipping_rate: dec!(99),
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub store_backend: StoreBackend,
  pub database_url: Option<String>,
  pub run_migrations: bool,

  pub pricing: PricingRules,

  pub payment_key_id: String,
  pub payment_key_secret: String,
  pub payment_timeout: Duration,

  pub notification_sender: String,
  pub notification_max_attempts: u32,
  pub notification_queue_capacity: usize,
}

// Keeps the payment secret out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("store_backend", &self.store_backend)
      .field("run_migrations", &self.run_migrations)
      .field("pricing", &self.pricing)
      .field("payment_key_id", &self.payment_key_id)
      .field("payment_timeout", &self.payment_timeout)
      .field("notification_sender", &self.notification_sender)
      .field("notification_max_attempts", &self.notification_max_attempts)
      .field("notification_queue_capacity", &self.notification_queue_capacity)
      .finish_non_exhaustive()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|_| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var::<u16>("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;

    let store_backend = match get_or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
      "postgres" => StoreBackend::Postgres,
      "memory" => StoreBackend::Memory,
      other => {
        return Err(AppError::Config(format!(
          "Invalid STORE_BACKEND '{}': expected 'postgres' or 'memory'",
          other
        )))
      }
    };
    let database_url = match store_backend {
      StoreBackend::Postgres => Some(get_env("DATABASE_URL")?),
      StoreBackend::Memory => get_env("DATABASE_URL").ok(),
    };
    let run_migrations = parse_var::<bool>("RUN_MIGRATIONS", &get_or("RUN_MIGRATIONS", "false"))?;

    let pricing = PricingRules {
      currency: get_or("CURRENCY", "INR").to_uppercase(),
      tax_rate: parse_var::<Decimal>("TAX_RATE", &get_or("TAX_RATE", "0.18"))?,
      free_shipping_threshold: parse_var::<Decimal>("FREE_SHIPPING_THRESHOLD", &get_or("FREE_SHIPPING_THRESHOLD", "999"))?,
      flat_shipping_rate: parse_var::<Decimal>("FLAT_SHIPPING_RATE", &get_or("FLAT_SHIPPING_RATE", "99"))?,
    };
    if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate >= Decimal::ONE {
      return Err(AppError::Config(format!("Invalid TAX_RATE: {} is outside [0, 1)", pricing.tax_rate)));
    }
    if pricing.free_shipping_threshold < Decimal::ZERO || pricing.flat_shipping_rate < Decimal::ZERO {
      return Err(AppError::Config("Shipping amounts must not be negative".to_string()));
    }

    let payment_key_id = get_or("PAYMENT_KEY_ID", "mock_key");
    let payment_key_secret = get_env("PAYMENT_KEY_SECRET")?;
    let payment_timeout_ms = parse_var::<u64>("PAYMENT_TIMEOUT_MS", &get_or("PAYMENT_TIMEOUT_MS", "10000"))?;

    let notification_sender = get_or("NOTIFICATION_SENDER", "noreply@example.com");
    let notification_max_attempts =
      parse_var::<u32>("NOTIFICATION_MAX_ATTEMPTS", &get_or("NOTIFICATION_MAX_ATTEMPTS", "3"))?.max(1);
    let notification_queue_capacity =
      parse_var::<usize>("NOTIFICATION_QUEUE_CAPACITY", &get_or("NOTIFICATION_QUEUE_CAPACITY", "1024"))?.max(1);

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      store_backend,
      database_url,
      run_migrations,
      pricing,
      payment_key_id,
      payment_key_secret,
      payment_timeout: Duration::from_millis(payment_timeout_ms),
      notification_sender,
      notification_max_attempts,
      notification_queue_capacity,
    })
  }
}

fn parse_var<T>(var_name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e)))
}
