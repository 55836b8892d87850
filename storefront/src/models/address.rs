// storefront/src/models/address.rs

use crate::errors::{AppError, Result as AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
  pub full_name: String,
  pub phone: String,
  pub line1: String,
  #[serde(default)]
  pub line2: Option<String>,
  pub city: String,
  pub state: String,
  pub postal_code: String,
  pub country: String,
}

impl ShippingAddress {
  pub fn validate(&self) -> AppResult<()> {
    let required = [
      ("full_name", &self.full_name),
      ("phone", &self.phone),
      ("line1", &self.line1),
      ("city", &self.city),
      ("state", &self.state),
      ("postal_code", &self.postal_code),
      ("country", &self.country),
    ];
    for (name, value) in required {
      if value.trim().is_empty() {
        return Err(AppError::validation(format!("shipping_address.{}", name), "is required"));
      }
    }

    let digits = self.phone.chars().filter(|c| c.is_ascii_digit()).count();
    let phone_chars_ok = self
      .phone
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if !phone_chars_ok || !(7..=15).contains(&digits) {
      return Err(AppError::validation(
        "shipping_address.phone",
        "must contain between 7 and 15 digits",
      ));
    }

    let postal = self.postal_code.trim();
    if !(3..=10).contains(&postal.len()) || !postal.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(AppError::validation(
        "shipping_address.postal_code",
        "must be 3 to 10 letters or digits",
      ));
    }
    Ok(())
  }
}
