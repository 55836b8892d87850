// storefront/src/models/order.rs

use crate::models::address::ShippingAddress;
use crate::models::cart_line::{Customization, VariantSelection};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
  Refunded,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Processing => "processing",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
      OrderStatus::Refunded => "refunded",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded)
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
  Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_method_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Online,
  CashOnDelivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub status: OrderStatus,
  pub message: String,
  pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
  pub carrier: String,
  pub tracking_number: String,
  pub url: Option<String>,
}

/// Snapshot of a cart line at the time the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price: Decimal,
  pub quantity: i32,
  pub line_total: Decimal,
  pub variant: Option<VariantSelection>,
  pub customization: Option<Customization>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub customer_id: Uuid,
  pub lines: Json<Vec<OrderLine>>,
  pub shipping_address: Json<ShippingAddress>,
  pub subtotal: Decimal,
  pub discount: Decimal,
  pub coupon_code: Option<String>,
  pub shipping: Decimal,
  pub tax: Decimal,
  pub total: Decimal,
  pub currency: String,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub status: OrderStatus,
  pub payment_session_ref: Option<String>,
  pub gateway_payment_id: Option<String>,
  pub tracking: Option<Json<TrackingInfo>>,
  pub timeline: Json<Vec<TimelineEntry>>,
  pub notes: Option<String>,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn format_order_number(sequence: i64) -> String {
    format!("ORD-{:06}", sequence)
  }

  /// total = subtotal - discount + shipping + tax
  pub fn totals_consistent(&self) -> bool {
    self.total == self.subtotal - self.discount + self.shipping + self.tax
  }

  pub fn push_timeline(&mut self, status: OrderStatus, message: impl Into<String>, at: DateTime<Utc>) {
    self.timeline.0.push(TimelineEntry {
      status,
      message: message.into(),
      at,
    });
  }
}
