use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::{Claims, TokenKind};
use crate::error::{AppError, TokenError};

fn subject_for(req: &HttpRequest, expected: TokenKind) -> Result<i32, AppError> {
    match req.extensions().get::<Claims>() {
        Some(claims) if claims.kind == expected => Ok(claims.sub),
        Some(_) => Err(AppError::Token(TokenError::Invalid)),
        None => Err(AppError::Token(TokenError::Missing)),
    }
}

/// The id of the user holding a valid **access** token.
///
/// Relies on `AuthMiddleware` having stored the verified claims. A refresh
/// token presented here is rejected as `invalid_token`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUserId(pub i32);

impl FromRequest for AuthenticatedUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            subject_for(req, TokenKind::Access)
                .map(AuthenticatedUserId)
                .map_err(Into::into),
        )
    }
}

/// The id of the user holding a valid **refresh** token. Only the refresh
/// endpoint uses this.
#[derive(Debug, Clone, Copy)]
pub struct RefreshUserId(pub i32);

impl FromRequest for RefreshUserId {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            subject_for(req, TokenKind::Refresh)
                .map(RefreshUserId)
                .map_err(Into::into),
        )
    }
}
