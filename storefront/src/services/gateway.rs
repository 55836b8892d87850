// storefront/src/services/gateway.rs

//! Payment gateway seam and the signing mock used in development and tests.

use crate::errors::{AppError, Result as AppResult};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Message the gateway signs when it reports a captured payment.
pub fn payment_message(session_ref: &str, payment_id: &str) -> String {
  format!("{}|{}", session_ref, payment_id)
}

/// Message the gateway signs when it reports a settled refund.
pub fn refund_message(payment_id: &str, refund_id: &str) -> String {
  format!("{}|{}", payment_id, refund_id)
}

/// Hex-encoded HMAC-SHA256 of `message`.
pub fn sign(secret: &str, message: &str) -> AppResult<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Internal(format!("Invalid signing key: {}", e)))?;
  mac.update(message.as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Recomputes the signature and compares it without early exit.
pub fn signature_matches(secret: &str, message: &str, signature: &str) -> bool {
  match sign(secret, message) {
    Ok(expected) => constant_time_eq(expected.as_bytes(), signature.trim().to_ascii_lowercase().as_bytes()),
    Err(_) => false,
  }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A checkout session opened with the gateway for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewaySession {
  pub session_ref: String,
  pub amount_minor: i64,
  pub currency: String,
  pub receipt: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Public key the client needs to complete payment.
  fn key_id(&self) -> &str;

  async fn create_session(&self, amount_minor: i64, currency: &str, receipt: &str) -> AppResult<GatewaySession>;

  /// Checks a gateway-signed message.
  fn verify_signature(&self, message: &str, signature: &str) -> bool;
}

/// How [`MockGateway`] answers `create_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
  Succeed,
  Fail,
  /// Never answers; exercises the caller's timeout.
  Hang,
}

pub struct MockGateway {
  key_id: String,
  secret: String,
  latency: Duration,
  behavior: Mutex<MockBehavior>,
}

impl MockGateway {
  pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
    Self {
      key_id: key_id.into(),
      secret: secret.into(),
      latency: Duration::from_millis(50),
      behavior: Mutex::new(MockBehavior::Succeed),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn set_behavior(&self, behavior: MockBehavior) {
    *self.behavior.lock() = behavior;
  }

  /// Signs like the real gateway does; lets tests forge valid callbacks.
  pub fn sign(&self, message: &str) -> AppResult<String> {
    sign(&self.secret, message)
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn key_id(&self) -> &str {
    &self.key_id
  }

  #[instrument(name = "MockGateway::create_session", skip(self), err(Display))]
  async fn create_session(&self, amount_minor: i64, currency: &str, receipt: &str) -> AppResult<GatewaySession> {
    if amount_minor <= 0 {
      return Err(AppError::PaymentGateway {
        message: "Amount must be greater than zero".to_string(),
        retryable: false,
      });
    }
    let behavior = *self.behavior.lock();
    match behavior {
      MockBehavior::Succeed => {}
      MockBehavior::Fail => {
        warn!("Simulated gateway failure.");
        return Err(AppError::PaymentGateway {
          message: "Gateway unavailable".to_string(),
          retryable: true,
        });
      }
      MockBehavior::Hang => std::future::pending::<()>().await,
    }
    tokio::time::sleep(self.latency).await;

    let session = GatewaySession {
      session_ref: format!("mock_sess_{}", Uuid::new_v4().simple()),
      amount_minor,
      currency: currency.to_string(),
      receipt: receipt.to_string(),
    };
    info!(session_ref = %session.session_ref, "Mock gateway session created.");
    Ok(session)
  }

  fn verify_signature(&self, message: &str, signature: &str) -> bool {
    signature_matches(&self.secret, message, signature)
  }
}
