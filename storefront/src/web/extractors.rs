// storefront/src/web/extractors.rs

//! Identity extractors. Authentication happens upstream; the identity
//! arrives as trusted headers and becomes an explicit `Actor`.

use crate::errors::AppError;
use crate::services::lifecycle::Actor;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

pub const CUSTOMER_HEADER: &str = "X-Customer-Id";
pub const ADMIN_HEADER: &str = "X-Admin-Id";

fn header_uuid(req: &HttpRequest, name: &str) -> Result<Option<Uuid>, AppError> {
  let Some(value) = req.headers().get(name) else {
    return Ok(None);
  };
  value
    .to_str()
    .ok()
    .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    .map(Some)
    .ok_or_else(|| {
      warn!(header = name, "Malformed identity header.");
      AppError::Unauthenticated(format!("invalid {} header", name))
    })
}

#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCustomer {
  pub customer_id: Uuid,
}

impl FromRequest for AuthenticatedCustomer {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = header_uuid(req, CUSTOMER_HEADER).and_then(|id| {
      id.map(|customer_id| AuthenticatedCustomer { customer_id })
        .ok_or_else(|| AppError::Unauthenticated(format!("missing {} header", CUSTOMER_HEADER)))
    });
    ready(result)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct AdminUser {
  pub admin_id: Uuid,
}

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = header_uuid(req, ADMIN_HEADER).and_then(|id| match id {
      Some(admin_id) => Ok(AdminUser { admin_id }),
      None if req.headers().contains_key(CUSTOMER_HEADER) => {
        Err(AppError::Forbidden("administrator access required".to_string()))
      }
      None => Err(AppError::Unauthenticated(format!("missing {} header", ADMIN_HEADER))),
    });
    ready(result)
  }
}

/// Either identity; an admin header wins when both are present.
#[derive(Debug, Clone, Copy)]
pub struct RequestActor(pub Actor);

impl FromRequest for RequestActor {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let result = (|| {
      if let Some(admin_id) = header_uuid(req, ADMIN_HEADER)? {
        return Ok(RequestActor(Actor::Admin(admin_id)));
      }
      if let Some(customer_id) = header_uuid(req, CUSTOMER_HEADER)? {
        return Ok(RequestActor(Actor::Customer(customer_id)));
      }
      Err(AppError::Unauthenticated("missing identity header".to_string()))
    })();
    ready(result)
  }
}
