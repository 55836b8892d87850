// storefront/src/pipelines/checkout_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{CartLine, PaymentMethod, ShippingAddress};
use crate::pipelines::contexts::{CheckoutCtxData, PaymentSessionCtxData};
use crate::services::coupon_engine;
use crate::services::pricing::{self, PriceBreakdown};
use crate::state::AppState;
use crate::store::{settle, PlaceOrder};
use chrono::Utc;
use flowline::{ContextData, FlowError, Flows, Pipeline, PipelineControl, PipelineResult, SkipCondition};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub const MAX_NOTES_LEN: usize = 1000;

/// Checkout body as posted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
  pub lines: Vec<CartLine>,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  #[serde(default)]
  pub coupon_code: Option<String>,
  #[serde(default)]
  pub notes: Option<String>,
}

impl CheckoutRequest {
  fn into_context(self, app_state: AppState, customer_id: Uuid) -> CheckoutCtxData {
    CheckoutCtxData::new(
      app_state,
      customer_id,
      self.lines,
      self.shipping_address,
      self.payment_method,
      self.coupon_code,
      self.notes,
    )
  }
}

/// What the client needs to complete an online payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentInstructions {
  pub session_ref: String,
  pub key_id: String,
  pub amount_minor: i64,
  pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
  pub order_id: Uuid,
  pub order_number: String,
  pub total: Decimal,
  pub currency: String,
  pub payment_method: PaymentMethod,
  pub payment: Option<PaymentInstructions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
  #[serde(flatten)]
  pub breakdown: PriceBreakdown,
  pub coupon_code: Option<String>,
}

fn skip_when(predicate: fn(&CheckoutCtxData) -> bool) -> Option<SkipCondition<CheckoutCtxData>> {
  Some(Arc::new(move |ctx_data: ContextData<CheckoutCtxData>| {
    let skip = predicate(&ctx_data.read());
    skip
  }))
}

fn validate_cart(data: &mut CheckoutCtxData) -> AppResult<()> {
  if data.lines.is_empty() {
    return Err(AppError::EmptyCart);
  }
  for (index, line) in data.lines.iter().enumerate() {
    line.validate(index)?;
  }
  data.shipping_address.validate()?;
  if let Some(notes) = &data.notes {
    if notes.chars().count() > MAX_NOTES_LEN {
      return Err(AppError::validation(
        "notes",
        format!("must be at most {} characters", MAX_NOTES_LEN),
      ));
    }
  }
  data.coupon_code = data
    .coupon_code
    .take()
    .map(|code| code.trim().to_string())
    .filter(|code| !code.is_empty());
  Ok(())
}

fn compute_price(data: &mut CheckoutCtxData) -> AppResult<()> {
  let discount = data.discount.as_ref().map(|d| d.discount).unwrap_or(Decimal::ZERO);
  let breakdown = pricing::compute(&data.prices, discount, &data.app_state.config.pricing)?;
  data.breakdown = Some(breakdown);
  Ok(())
}

fn prepare_payment_session(data: &mut CheckoutCtxData) -> AppResult<()> {
  let order = data
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("payment step reached without a persisted order".to_string()))?;
  // Nothing to collect for cash on delivery or a fully discounted order.
  if order.payment_method != PaymentMethod::Online || order.total == Decimal::ZERO {
    return Ok(());
  }
  let sub_ctx = PaymentSessionCtxData {
    app_state: data.app_state.clone(),
    order_id: order.id,
    amount: order.total,
    receipt: order.order_number.clone(),
    session: None,
  };
  data.payment_session = Some(ContextData::new(sub_ctx));
  Ok(())
}

/// Scoped pipeline run for online orders: opens the gateway session and
/// records its reference on the order.
fn payment_session_pipeline() -> Arc<Pipeline<PaymentSessionCtxData, AppError>> {
  let mut p = Pipeline::<PaymentSessionCtxData, AppError>::new(&[("create_gateway_session", false, None)]);

  p.on_root("create_gateway_session", |sub_ctx: ContextData<PaymentSessionCtxData>| {
    Box::pin(async move {
      let (payments, order_id, amount, receipt) = {
        let guard = sub_ctx.read();
        (
          guard.app_state.payments.clone(),
          guard.order_id,
          guard.amount,
          guard.receipt.clone(),
        )
      };
      let session = payments.create_session(order_id, amount, &receipt).await?;
      sub_ctx.write().session = Some(session);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  Arc::new(p)
}

pub fn register_checkout_pipeline(flows: &Flows<AppError>) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("validate_cart", false, None),
    ("resolve_products", false, None),
    ("preview_coupon", false, skip_when(|data| data.coupon_code.is_none())),
    ("compute_price", false, None),
    ("persist_order", false, skip_when(|data| data.quote_only)),
    ("open_payment_session", false, skip_when(|data| data.quote_only)),
  ]);

  p.on_root("validate_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      validate_cart(&mut ctx_data.write())?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Availability here is advisory; persist_order re-checks under lock.
  p.on_root("resolve_products", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (catalog, lines) = {
        let guard = ctx_data.read();
        (guard.app_state.catalog.clone(), guard.lines.clone())
      };

      let mut products = HashMap::new();
      for (product_id, requested) in settle::aggregate_demand(&lines)? {
        let product = catalog.resolve_product(product_id).await?;
        settle::check_availability(product_id, product.as_ref(), requested)?;
        if let Some(product) = product {
          products.insert(product_id, product);
        }
      }
      let prices = settle::line_prices(&lines, &products)?;

      ctx_data.write().prices = prices;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("preview_coupon", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (coupons, code, customer_id, cart_total) = {
        let guard = ctx_data.read();
        (
          guard.app_state.coupons.clone(),
          guard.coupon_code.clone(),
          guard.customer_id,
          pricing::subtotal(&guard.prices),
        )
      };
      let Some(code) = code else {
        return Ok(PipelineControl::Continue);
      };

      let coupon = coupons.find_coupon(&code).await?;
      let uses = coupons.customer_uses(&code, customer_id).await?;
      let discount = coupon_engine::validate(&code, coupon.as_ref(), cart_total, uses, Utc::now())?;
      info!(code = %discount.code, discount = %discount.discount, "Coupon accepted for checkout.");
      ctx_data.write().discount = Some(discount);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("compute_price", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      compute_price(&mut ctx_data.write())?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("persist_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (orders, request, quoted_total) = {
        let guard = ctx_data.read();
        let request = PlaceOrder {
          customer_id: guard.customer_id,
          lines: guard.lines.clone(),
          shipping_address: guard.shipping_address.clone(),
          payment_method: guard.payment_method,
          coupon_code: guard.coupon_code.clone(),
          notes: guard.notes.clone(),
          rules: guard.app_state.config.pricing.clone(),
          now: Utc::now(),
        };
        (
          guard.app_state.orders.clone(),
          request,
          guard.breakdown.as_ref().map(|b| b.total),
        )
      };

      let order = orders.place_order(request).await?;
      if quoted_total != Some(order.total) {
        warn!(order_number = %order.order_number, ?quoted_total, total = %order.total, "Order total differs from the pre-transaction quote.");
      }
      info!(order_number = %order.order_number, total = %order.total, "Order persisted.");
      ctx_data.write().order = Some(order);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.before_root("open_payment_session", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      prepare_payment_session(&mut ctx_data.write())?;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.conditional_scopes_for_step("open_payment_session")
    .add_static_scope(
      payment_session_pipeline(),
      |ctx_data: ContextData<CheckoutCtxData>| {
        let sub_ctx = ctx_data.read().payment_session.clone();
        sub_ctx.ok_or_else(|| FlowError::ExtractorFailure {
          step_name: "open_payment_session".to_string(),
          source: anyhow::anyhow!("payment session context was not prepared"),
        })
      },
    )
    .on_condition(|ctx_data: ContextData<CheckoutCtxData>| {
      let prepared = ctx_data.read().payment_session.is_some();
      prepared
    })
    .if_no_scope_matches(PipelineControl::Continue)
    .finalize_conditional_step(false);

  p.after_root("open_payment_session", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (session, free_order) = {
        let guard = ctx_data.read();
        let session = guard
          .payment_session
          .as_ref()
          .and_then(|sub_ctx| sub_ctx.read().session.clone());
        let free_order = guard
          .order
          .as_ref()
          .filter(|o| o.payment_method == PaymentMethod::Online && o.total == Decimal::ZERO)
          .map(|o| o.id);
        (session, free_order)
      };

      if let Some(session) = session {
        if let Some(order) = ctx_data.write().order.as_mut() {
          order.payment_session_ref = Some(session.session_ref);
        }
      } else if let Some(order_id) = free_order {
        let payments = ctx_data.read().app_state.payments.clone();
        let confirmed = payments.confirm_without_charge(order_id).await?;
        ctx_data.write().order = Some(confirmed);
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  flows.register_pipeline(p);
  info!("Checkout pipeline registered.");
}

fn outcome_from(data: &CheckoutCtxData) -> AppResult<CheckoutOutcome> {
  let order = data
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("checkout completed without an order".to_string()))?;

  let payment = match &data.payment_session {
    Some(sub_ctx) => {
      let session = sub_ctx
        .read()
        .session
        .clone()
        .ok_or_else(|| AppError::Internal("online checkout completed without a payment session".to_string()))?;
      Some(PaymentInstructions {
        session_ref: session.session_ref,
        key_id: data.app_state.payments.key_id().to_string(),
        amount_minor: session.amount_minor,
        currency: session.currency,
      })
    }
    None => None,
  };

  Ok(CheckoutOutcome {
    order_id: order.id,
    order_number: order.order_number.clone(),
    total: order.total,
    currency: order.currency.clone(),
    payment_method: order.payment_method,
    payment,
  })
}

/// Cancels an order the pipeline persisted before failing, restoring stock
/// and the coupon redemption. Returns `cause` unless voiding fails too, in
/// which case the order is still live and the error says so.
async fn void_persisted_order(app_state: &AppState, ctx_data: &ContextData<CheckoutCtxData>, cause: AppError) -> AppError {
  let persisted = ctx_data.read().order.as_ref().map(|o| (o.id, o.order_number.clone()));
  let Some((order_id, order_number)) = persisted else {
    return cause;
  };
  let message = format!("Order cancelled: payment could not be initiated ({}).", cause);
  match app_state.orders.void_order(order_id, &message, Utc::now()).await {
    Ok(_) => {
      info!(%order_number, "Voided order after payment initiation failed.");
      cause
    }
    Err(e) => {
      error!(%order_number, error = %e, cause = %cause, "Failed to void order after payment initiation failed.");
      AppError::Integrity(format!(
        "order {} is still pending: payment initiation failed ({}) and voiding it failed ({})",
        order_number, cause, e
      ))
    }
  }
}

/// Runs the checkout pipeline: validates and prices the cart, places the
/// order and, for online payment, opens a gateway session.
#[instrument(
  name = "checkout::create_order",
  skip(app_state, request),
  fields(lines = request.lines.len(), payment_method = ?request.payment_method),
  err(Display)
)]
pub async fn create_order(app_state: &AppState, customer_id: Uuid, request: CheckoutRequest) -> AppResult<CheckoutOutcome> {
  let ctx_data = ContextData::new(request.into_context(app_state.clone(), customer_id));

  match app_state.flows.run(ctx_data.clone()).await {
    Ok(PipelineResult::Completed) => {
      let outcome = outcome_from(&ctx_data.read())?;
      info!(order_number = %outcome.order_number, total = %outcome.total, "Checkout completed.");
      Ok(outcome)
    }
    Ok(PipelineResult::Stopped) => {
      let cause = AppError::Internal("checkout pipeline stopped before completion".to_string());
      Err(void_persisted_order(app_state, &ctx_data, cause).await)
    }
    Err(e) => Err(void_persisted_order(app_state, &ctx_data, e).await),
  }
}

/// Prices a cart without persisting anything.
#[instrument(name = "checkout::quote", skip(app_state, request), err(Display))]
pub async fn quote(app_state: &AppState, customer_id: Uuid, request: CheckoutRequest) -> AppResult<Quote> {
  let mut data = request.into_context(app_state.clone(), customer_id);
  data.quote_only = true;
  let ctx_data = ContextData::new(data);

  if app_state.flows.run(ctx_data.clone()).await? == PipelineResult::Stopped {
    return Err(AppError::Internal("quote pipeline stopped before completion".to_string()));
  }
  let guard = ctx_data.read();
  let breakdown = guard
    .breakdown
    .clone()
    .ok_or_else(|| AppError::Internal("quote completed without a price".to_string()))?;
  Ok(Quote {
    breakdown,
    coupon_code: guard.discount.as_ref().map(|d| d.code.clone()),
  })
}
