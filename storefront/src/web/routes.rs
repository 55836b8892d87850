// storefront/src/web/routes.rs

use crate::errors::AppError;
use crate::web::handlers::{checkout_handlers, coupon_handlers, order_handlers, payment_handlers};
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed bodies become field-level validation errors in the usual envelope.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  let message = match &err {
    JsonPayloadError::Deserialize(e) => e.to_string(),
    other => other.to_string(),
  };
  AppError::validation("body", message).into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.app_data(web::JsonConfig::default().limit(256 * 1024).error_handler(json_error_handler));
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/checkout")
          .route("", web::post().to(checkout_handlers::checkout_handler))
          .route("/quote", web::post().to(checkout_handlers::quote_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route(
            "/{order_id}/transition",
            web::post().to(order_handlers::transition_order_handler),
          ),
      )
      .service(
        web::scope("/payment")
          .route("/callback", web::post().to(payment_handlers::payment_callback_handler))
          .route("/refund-callback", web::post().to(payment_handlers::refund_callback_handler)),
      )
      .route("/coupons/preview", web::post().to(coupon_handlers::preview_coupon_handler))
      .route("/admin/coupons", web::post().to(coupon_handlers::create_coupon_handler)),
  );
}
