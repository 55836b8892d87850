// storefront/src/models/mod.rs

//! Data structures for persisted entities and checkout input.

pub mod address;
pub mod cart_line;
pub mod coupon;
pub mod order;
pub mod product;

pub use address::ShippingAddress;
pub use cart_line::{CartLine, Customization, VariantSelection};
pub use coupon::{Coupon, DiscountType, NewCoupon};
pub use order::{Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, TimelineEntry, TrackingInfo};
pub use product::Product;
