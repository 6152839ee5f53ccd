//! Session validation happens upstream of this server. The upstream layer forwards the id of the signed-in user in the
//! [`USER_HEADER`] header, and handlers take an [`AuthenticatedUser`] argument to require it.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use log::*;

use crate::errors::ServerError;

pub const USER_HEADER: &str = "X-Authenticated-User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl AuthenticatedUser {
    pub fn as_str(&self) -> &str {
        self.user_id.as_str()
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(USER_HEADER)
            .ok_or_else(|| ServerError::Unauthenticated(format!("The {USER_HEADER} header is missing")))
            .and_then(|v| {
                v.to_str().map_err(|e| {
                    debug!("💻️ Could not read {USER_HEADER} header. {e}");
                    ServerError::Unauthenticated(format!("The {USER_HEADER} header is not valid text"))
                })
            })
            .map(str::trim)
            .and_then(|s| match s.is_empty() {
                true => Err(ServerError::Unauthenticated(format!("The {USER_HEADER} header is empty"))),
                false => Ok(AuthenticatedUser { user_id: s.to_string() }),
            });
        ready(user)
    }
}
