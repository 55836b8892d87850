// storefront/src/store/settle.rs

//! Order-placement rules shared by both stores. Each store reads products and
//! the coupon under its own lock and hands them to these functions.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{CartLine, Coupon, Order, OrderLine, OrderStatus, PaymentStatus, Product};
use crate::services::coupon_engine::{self, DiscountResult};
use crate::services::pricing::{self, LinePrice};
use crate::store::PlaceOrder;
use rust_decimal::Decimal;
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub const ORDER_PLACED_MESSAGE: &str = "Order placed";

/// Requested quantity per product, summed across lines, in product-id order.
/// Stores lock rows in this order.
pub fn aggregate_demand(lines: &[CartLine]) -> AppResult<Vec<(Uuid, i32)>> {
  let mut demand: BTreeMap<Uuid, i32> = BTreeMap::new();
  for (index, line) in lines.iter().enumerate() {
    let total = demand.entry(line.product_id).or_insert(0);
    *total = total.checked_add(line.quantity).ok_or_else(|| {
      AppError::validation(
        format!("lines[{}].quantity", index),
        "total quantity for this product is too large",
      )
    })?;
  }
  Ok(demand.into_iter().collect())
}

/// Quantity to put back per product when an order is voided, in the same
/// product-id order as [`aggregate_demand`].
pub fn restock_quantities(lines: &[OrderLine]) -> AppResult<Vec<(Uuid, i32)>> {
  let mut restock: BTreeMap<Uuid, i32> = BTreeMap::new();
  for line in lines {
    let total = restock.entry(line.product_id).or_insert(0);
    *total = total
      .checked_add(line.quantity)
      .ok_or_else(|| AppError::Integrity(format!("restock quantity for product {} overflows", line.product_id)))?;
  }
  Ok(restock.into_iter().collect())
}

pub fn check_availability(product_id: Uuid, product: Option<&Product>, requested: i32) -> AppResult<()> {
  let product = match product {
    Some(p) if p.active => p,
    _ => return Err(AppError::ProductUnavailable { product_id }),
  };
  if product.stock_quantity < requested {
    return Err(AppError::InsufficientStock {
      product_id,
      product_name: product.name.clone(),
      requested,
      available: product.stock_quantity,
    });
  }
  Ok(())
}

/// Server-side prices for `lines`, in line order.
pub fn line_prices(lines: &[CartLine], products: &HashMap<Uuid, Product>) -> AppResult<Vec<LinePrice>> {
  lines
    .iter()
    .map(|line| {
      let product = products
        .get(&line.product_id)
        .ok_or(AppError::ProductUnavailable {
          product_id: line.product_id,
        })?;
      Ok(LinePrice {
        unit_price: product.price,
        quantity: line.quantity,
      })
    })
    .collect()
}

/// Runs the coupon engine if the request carries a code.
pub fn redeemable_discount(
  request: &PlaceOrder,
  coupon: Option<&Coupon>,
  customer_uses: i64,
  subtotal: Decimal,
) -> AppResult<Option<DiscountResult>> {
  match &request.coupon_code {
    Some(code) => Ok(Some(coupon_engine::validate(
      code,
      coupon,
      subtotal,
      customer_uses,
      request.now,
    )?)),
    None => Ok(None),
  }
}

/// Builds the pending order from locked product rows and an already
/// validated discount.
pub fn build_order(
  request: &PlaceOrder,
  products: &HashMap<Uuid, Product>,
  discount: Option<&DiscountResult>,
  sequence: i64,
) -> AppResult<Order> {
  let prices = line_prices(&request.lines, products)?;
  let breakdown = pricing::compute(
    &prices,
    discount.map(|d| d.discount).unwrap_or(Decimal::ZERO),
    &request.rules,
  )?;

  let lines = request
    .lines
    .iter()
    .zip(prices.iter())
    .map(|(line, price)| OrderLine {
      product_id: line.product_id,
      product_name: products
        .get(&line.product_id)
        .map(|p| p.name.clone())
        .unwrap_or_default(),
      unit_price: price.unit_price,
      quantity: line.quantity,
      line_total: price.unit_price * Decimal::from(line.quantity),
      variant: line.variant.clone(),
      customization: line.customization.clone(),
    })
    .collect();

  let mut order = Order {
    id: Uuid::new_v4(),
    order_number: Order::format_order_number(sequence),
    customer_id: request.customer_id,
    lines: Json(lines),
    shipping_address: Json(request.shipping_address.clone()),
    subtotal: breakdown.subtotal,
    discount: breakdown.discount,
    coupon_code: discount.map(|d| d.code.clone()),
    shipping: breakdown.shipping,
    tax: breakdown.tax,
    total: breakdown.total,
    currency: breakdown.currency,
    payment_method: request.payment_method,
    payment_status: PaymentStatus::Pending,
    status: OrderStatus::Pending,
    payment_session_ref: None,
    gateway_payment_id: None,
    tracking: None,
    timeline: Json(Vec::new()),
    notes: request.notes.clone(),
    version: 1,
    created_at: request.now,
    updated_at: request.now,
  };
  order.push_timeline(OrderStatus::Pending, ORDER_PLACED_MESSAGE, request.now);

  if !order.totals_consistent() {
    return Err(AppError::Integrity(format!(
      "order {} totals do not add up",
      order.order_number
    )));
  }
  Ok(order)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cart_line(product_id: Uuid, quantity: i32) -> CartLine {
    CartLine {
      product_id,
      quantity,
      unit_price: None,
      variant: None,
      customization: None,
    }
  }

  #[test]
  fn demand_is_summed_in_product_order() {
    let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
    let demand = aggregate_demand(&[cart_line(b, 1), cart_line(a, 2), cart_line(b, 3)]).unwrap();
    assert_eq!(demand, vec![(a, 2), (b, 4)]);
  }

  #[test]
  fn restock_follows_product_order() {
    let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
    let order_line = |product_id: Uuid, quantity: i32| OrderLine {
      product_id,
      product_name: "Mug".to_string(),
      unit_price: Decimal::ONE,
      quantity,
      line_total: Decimal::from(quantity),
      variant: None,
      customization: None,
    };
    let restock = restock_quantities(&[order_line(b, 1), order_line(a, 2), order_line(b, 1)]).unwrap();
    assert_eq!(restock, vec![(a, 2), (b, 2)]);
  }

  #[test]
  fn overflowing_demand_is_a_validation_error() {
    let product = Uuid::new_v4();
    let err = aggregate_demand(&[cart_line(product, i32::MAX), cart_line(product, 2)]).unwrap_err();
    match err {
      AppError::Validation { field, .. } => assert_eq!(field, "lines[1].quantity"),
      other => panic!("expected a validation error, got {:?}", other),
    }
  }
}
