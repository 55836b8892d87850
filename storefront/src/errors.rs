// storefront/src/errors.rs

use crate::models::OrderStatus;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use flowline::FlowError;
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Why a coupon code was refused for a given cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
  #[error("Coupon '{code}' does not exist or is inactive")]
  NotFound { code: String },

  #[error("Coupon '{code}' has expired")]
  Expired { code: String },

  #[error("Coupon '{code}' is not valid yet")]
  NotYetValid { code: String },

  #[error("Coupon '{code}' requires a minimum order of {minimum}; add {shortfall} more")]
  MinimumOrderNotMet {
    code: String,
    minimum: Decimal,
    shortfall: Decimal,
  },

  #[error("Coupon '{code}' has reached its usage limit")]
  UsageLimitReached { code: String },

  #[error("Coupon '{code}' has already been used the maximum number of times by this customer")]
  PerUserLimitReached { code: String },
}

impl CouponRejection {
  pub fn code(&self) -> &'static str {
    match self {
      CouponRejection::NotFound { .. } => "coupon_not_found",
      CouponRejection::Expired { .. } => "coupon_expired",
      CouponRejection::NotYetValid { .. } => "coupon_not_yet_valid",
      CouponRejection::MinimumOrderNotMet { .. } => "minimum_order_not_met",
      CouponRejection::UsageLimitReached { .. } => "coupon_usage_limit_reached",
      CouponRejection::PerUserLimitReached { .. } => "coupon_per_user_limit_reached",
    }
  }
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation failed for '{field}': {message}")]
  Validation { field: String, message: String },

  #[error("Cart is empty")]
  EmptyCart,

  #[error("Authentication required: {0}")]
  Unauthenticated(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Order {0} not found")]
  OrderNotFound(Uuid),

  #[error("Product {product_id} is not available")]
  ProductUnavailable { product_id: Uuid },

  #[error("Insufficient stock for '{product_name}': requested {requested}, available {available}")]
  InsufficientStock {
    product_id: Uuid,
    product_name: String,
    requested: i32,
    available: i32,
  },

  #[error(transparent)]
  Coupon(#[from] CouponRejection),

  #[error("Invalid coupon definition: {0}")]
  InvalidCoupon(String),

  #[error("Coupon '{0}' already exists")]
  CouponAlreadyExists(String),

  #[error("Illegal order transition from {from} to {to}")]
  IllegalTransition { from: OrderStatus, to: OrderStatus },

  #[error("Order can no longer be cancelled by the customer (status {status})")]
  CancellationWindowClosed { status: OrderStatus },

  #[error("Order {0} was modified concurrently")]
  ConcurrentModification(Uuid),

  #[error("Price computation failed: {0}")]
  PriceComputation(String),

  #[error("Integrity violation: {0}")]
  Integrity(String),

  #[error("Payment gateway error: {message}")]
  PaymentGateway { message: String, retryable: bool },

  #[error("Payment gateway did not respond in time")]
  PaymentGatewayTimeout,

  #[error("Payment verification failed: {0}")]
  PaymentVerificationFailed(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
    AppError::Validation {
      field: field.into(),
      message: message.into(),
    }
  }

  /// Stable machine-readable code, part of the HTTP contract.
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Validation { .. } => "validation_failed",
      AppError::EmptyCart => "empty_cart",
      AppError::Unauthenticated(_) => "unauthenticated",
      AppError::Forbidden(_) => "forbidden",
      AppError::OrderNotFound(_) => "order_not_found",
      AppError::ProductUnavailable { .. } => "product_unavailable",
      AppError::InsufficientStock { .. } => "insufficient_stock",
      AppError::Coupon(rejection) => rejection.code(),
      AppError::InvalidCoupon(_) => "invalid_coupon_definition",
      AppError::CouponAlreadyExists(_) => "coupon_already_exists",
      AppError::IllegalTransition { .. } => "illegal_transition",
      AppError::CancellationWindowClosed { .. } => "cancellation_window_closed",
      AppError::ConcurrentModification(_) => "concurrent_modification",
      AppError::PriceComputation(_) => "price_computation_error",
      AppError::Integrity(_) => "integrity_error",
      AppError::PaymentGateway { .. } => "payment_gateway_error",
      AppError::PaymentGatewayTimeout => "payment_gateway_timeout",
      AppError::PaymentVerificationFailed(_) => "payment_verification_failed",
      AppError::Config(_) => "configuration_error",
      AppError::Sqlx(_) => "database_error",
      AppError::Workflow { .. } => "workflow_error",
      AppError::Internal(_) => "internal_error",
    }
  }

  /// Whether the same request may succeed if retried unchanged.
  pub fn is_retryable(&self) -> bool {
    match self {
      AppError::PaymentGateway { retryable, .. } => *retryable,
      AppError::PaymentGatewayTimeout | AppError::ConcurrentModification(_) => true,
      _ => false,
    }
  }

  fn field(&self) -> Option<&str> {
    match self {
      AppError::Validation { field, .. } => Some(field),
      _ => None,
    }
  }

  /// Message safe to return to clients; infrastructure details stay in the logs.
  fn public_message(&self) -> String {
    match self {
      AppError::Sqlx(_) => "Database operation failed".to_string(),
      AppError::Workflow { .. } => "Workflow processing error".to_string(),
      AppError::Config(_) => "Configuration issue".to_string(),
      AppError::Internal(_) => "An internal error occurred".to_string(),
      other => other.to_string(),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation { .. }
      | AppError::EmptyCart
      | AppError::InvalidCoupon(_)
      | AppError::PaymentVerificationFailed(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::OrderNotFound(_) => StatusCode::NOT_FOUND,
      AppError::ProductUnavailable { .. }
      | AppError::InsufficientStock { .. }
      | AppError::CouponAlreadyExists(_)
      | AppError::IllegalTransition { .. }
      | AppError::CancellationWindowClosed { .. }
      | AppError::ConcurrentModification(_) => StatusCode::CONFLICT,
      AppError::Coupon(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::PaymentGateway { .. } => StatusCode::BAD_GATEWAY,
      AppError::PaymentGatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
      AppError::PriceComputation(_)
      | AppError::Integrity(_)
      | AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, code = self.code(), "Responding with error");
    } else {
      tracing::info!(application_error = %self, code = self.code(), "Responding with error");
    }

    let mut body = json!({
      "code": self.code(),
      "message": self.public_message(),
    });
    if let Some(field) = self.field() {
      body["field"] = json!(field);
    }
    HttpResponse::build(status).json(json!({ "error": body }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
