// storefront/src/pipelines/contexts.rs

//! Data carried through the checkout pipelines. Handlers receive these
//! wrapped in `flowline::ContextData`.

use crate::models::{CartLine, Order, PaymentMethod, ShippingAddress};
use crate::services::coupon_engine::DiscountResult;
use crate::services::gateway::GatewaySession;
use crate::services::pricing::{LinePrice, PriceBreakdown};
use crate::state::AppState;
use flowline::ContextData;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Main checkout context (TData).
#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub customer_id: Uuid,
  pub lines: Vec<CartLine>,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub coupon_code: Option<String>,
  pub notes: Option<String>,
  /// Stop after pricing; nothing is persisted.
  pub quote_only: bool,

  pub prices: Vec<LinePrice>,
  pub discount: Option<DiscountResult>,
  pub breakdown: Option<PriceBreakdown>,
  pub order: Option<Order>,
  pub payment_session: Option<ContextData<PaymentSessionCtxData>>,
}

impl CheckoutCtxData {
  pub fn new(
    app_state: AppState,
    customer_id: Uuid,
    lines: Vec<CartLine>,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    coupon_code: Option<String>,
    notes: Option<String>,
  ) -> Self {
    Self {
      app_state,
      customer_id,
      lines,
      shipping_address,
      payment_method,
      coupon_code,
      notes,
      quote_only: false,
      prices: Vec::new(),
      discount: None,
      breakdown: None,
      order: None,
      payment_session: None,
    }
  }
}

/// Sub-context of the gateway-session scope (SData).
#[derive(Clone)]
pub struct PaymentSessionCtxData {
  pub app_state: AppState,
  pub order_id: Uuid,
  pub amount: Decimal,
  pub receipt: String,
  pub session: Option<GatewaySession>,
}
