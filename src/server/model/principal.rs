use std::future::{ready, Ready};
use std::str::FromStr;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use derive_more::Display;

use crate::server::controller::error::CoreError;

/// headers set by the authenticating gateway in front of this service
pub(crate) const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub(crate) const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    #[display("admin")]
    Admin,
    #[display("staff")]
    Staff,
    #[display("customer")]
    Customer,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "customer" => Ok(Self::Customer),
            s => Err(format!("Invalid role: {s}")),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Staff)
    }

    /// Fails with `Forbidden` unless the caller works at the restaurant.
    pub fn require_staff(&self, action: &str) -> Result<(), CoreError> {
        if self.is_staff() {
            return Ok(());
        }
        Err(CoreError::forbidden(format!("{} may not {}", self.role, action)))
    }
}

impl FromRequest for Principal {
    type Error = CoreError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let principal = match header(PRINCIPAL_ROLE_HEADER).map(Role::from_str) {
            Some(Ok(role)) => Ok(Principal::new(header(PRINCIPAL_ID_HEADER).unwrap_or("anonymous"), role)),
            Some(Err(e)) => Err(CoreError::forbidden(e)),
            None => Err(CoreError::forbidden("request carries no authenticated principal")),
        };
        ready(principal)
    }
}
