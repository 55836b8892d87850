// storefront/src/models/cart_line.rs

use crate::errors::{AppError, Result as AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_CUSTOMIZATION_TEXT: usize = 500;
pub const MAX_REFERENCE_IMAGES: usize = 5;
pub const MAX_CUSTOMIZATION_NOTES: usize = 1000;
pub const MAX_VARIANT_FIELD: usize = 64;
pub const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSelection {
  pub name: String,
  pub value: String,
}

/// Free-form personalisation attached to a line. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Customization {
  pub text: Option<String>,
  #[serde(default)]
  pub reference_images: Vec<String>,
  pub notes: Option<String>,
}

/// A line as submitted by the client at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
  pub product_id: Uuid,
  pub quantity: i32,
  /// Price the client displayed. Never used for pricing.
  #[serde(default)]
  pub unit_price: Option<Decimal>,
  #[serde(default)]
  pub variant: Option<VariantSelection>,
  #[serde(default)]
  pub customization: Option<Customization>,
}

impl CartLine {
  pub fn validate(&self, index: usize) -> AppResult<()> {
    let prefix = format!("lines[{}]", index);
    if self.quantity < 1 {
      return Err(AppError::validation(
        format!("{}.quantity", prefix),
        "quantity must be at least 1",
      ));
    }
    if self.quantity > MAX_LINE_QUANTITY {
      return Err(AppError::validation(
        format!("{}.quantity", prefix),
        format!("quantity must be at most {}", MAX_LINE_QUANTITY),
      ));
    }
    if let Some(variant) = &self.variant {
      variant.validate(&format!("{}.variant", prefix))?;
    }
    if let Some(customization) = &self.customization {
      customization.validate(&format!("{}.customization", prefix))?;
    }
    Ok(())
  }
}

impl VariantSelection {
  fn validate(&self, prefix: &str) -> AppResult<()> {
    for (name, value) in [("name", &self.name), ("value", &self.value)] {
      if value.trim().is_empty() {
        return Err(AppError::validation(format!("{}.{}", prefix, name), "must not be blank"));
      }
      if value.chars().count() > MAX_VARIANT_FIELD {
        return Err(AppError::validation(
          format!("{}.{}", prefix, name),
          format!("must be at most {} characters", MAX_VARIANT_FIELD),
        ));
      }
    }
    Ok(())
  }
}

impl Customization {
  fn validate(&self, prefix: &str) -> AppResult<()> {
    if let Some(text) = &self.text {
      if text.chars().count() > MAX_CUSTOMIZATION_TEXT {
        return Err(AppError::validation(
          format!("{}.text", prefix),
          format!("must be at most {} characters", MAX_CUSTOMIZATION_TEXT),
        ));
      }
    }
    if self.reference_images.len() > MAX_REFERENCE_IMAGES {
      return Err(AppError::validation(
        format!("{}.reference_images", prefix),
        format!("at most {} images are allowed", MAX_REFERENCE_IMAGES),
      ));
    }
    for (i, url) in self.reference_images.iter().enumerate() {
      if !(url.starts_with("https://") || url.starts_with("http://")) || url.contains(char::is_whitespace) {
        return Err(AppError::validation(
          format!("{}.reference_images[{}]", prefix, i),
          "must be an http(s) URL",
        ));
      }
    }
    if let Some(notes) = &self.notes {
      if notes.chars().count() > MAX_CUSTOMIZATION_NOTES {
        return Err(AppError::validation(
          format!("{}.notes", prefix),
          format!("must be at most {} characters", MAX_CUSTOMIZATION_NOTES),
        ));
      }
    }
    Ok(())
  }
}
