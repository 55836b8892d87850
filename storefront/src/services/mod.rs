// storefront/src/services/mod.rs

pub mod coupon_engine;
pub mod gateway;
pub mod lifecycle;
pub mod notifier;
pub mod payment;
pub mod pricing;
