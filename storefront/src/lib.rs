// storefront/src/lib.rs

//! Order and checkout orchestration for the storefront: pricing, coupons,
//! order persistence, payment coordination and the order lifecycle, served
//! over actix-web.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

pub use errors::{AppError, Result};
pub use state::AppState;
