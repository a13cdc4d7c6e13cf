//!
//! # Custom Error Handling
//!
//! This module defines the `AppError` type used throughout the application.
//! Every failure a handler can produce is one of its variants, and each variant
//! knows which HTTP status it maps to.
//!
//! `AppError` implements `actix_web::error::ResponseError`, rendering itself as
//! the same `{ success: false, message, errors?, error? }` envelope that
//! successful responses use (see [`crate::response`]). `From` implementations
//! for `sqlx::Error`, `validator::ValidationErrors`, `jsonwebtoken::errors::Error`
//! and `bcrypt::BcryptError` allow the `?` operator in handlers.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;
use validator::ValidationErrors;

use crate::response::{ErrorBody, FieldErrors};

/// Why a bearer token was rejected.
///
/// Clients rely on the distinction: `Expired` means "use the refresh token",
/// the other two mean "log in again".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// The signature checked out but `exp` is in the past.
    Expired,
    /// Malformed, badly signed, or the wrong kind of token for the route.
    Invalid,
    /// No `Authorization: Bearer` header was sent.
    Missing,
}

impl TokenError {
    /// Machine-readable code placed in the `error` field of the envelope.
    pub fn code(self) -> &'static str {
        match self {
            TokenError::Expired => "token_expired",
            TokenError::Invalid => "invalid_token",
            TokenError::Missing => "authorization_required",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            TokenError::Expired => "Token has expired",
            TokenError::Invalid => "Invalid token",
            TokenError::Missing => "Authorization token is missing",
        }
    }
}

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request that is not tied to a single field (HTTP 400).
    BadRequest(String),
    /// Field-level validation failure (HTTP 400). `errors` holds one message
    /// for every field that failed.
    Validation { message: String, errors: FieldErrors },
    /// Credentials were rejected (HTTP 401).
    Unauthorized(String),
    /// Bearer token missing, expired or invalid (HTTP 401).
    Token(TokenError),
    /// Missing resource, or one owned by somebody else (HTTP 404).
    NotFound(String),
    /// Uniqueness violation such as a duplicate email (HTTP 409).
    Conflict(String),
    /// Client exceeded the request budget (HTTP 429).
    TooManyRequests(String),
    /// Unexpected server-side failure (HTTP 500). The message is logged, not sent.
    InternalServerError(String),
    /// Failure inside the persistence layer (HTTP 500). The message is logged, not sent.
    DatabaseError(String),
}

impl AppError {
    /// Shorthand for a validation failure on a single field.
    pub fn field(message: &str, field: &str, detail: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), detail.into());
        AppError::Validation {
            message: message.to_string(),
            errors,
        }
    }

    /// Converts collected `validator` errors into a `Validation` error with
    /// the given summary message.
    pub fn invalid(message: &str, errors: ValidationErrors) -> Self {
        AppError::Validation {
            message: message.to_string(),
            errors: crate::validation::field_messages(&errors),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Validation { message, errors } => {
                write!(f, "Validation Error: {} {:?}", message, errors)
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Token(kind) => write!(f, "Unauthorized: {}", kind.message()),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::TooManyRequests(msg) => write!(f, "Too Many Requests: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => ErrorBody::new(msg.clone()),
            AppError::Validation { message, errors } => {
                ErrorBody::new(message.clone()).with_errors(errors.clone())
            }
            AppError::Token(kind) => ErrorBody::new(kind.message()).with_code(kind.code()),
            AppError::TooManyRequests(msg) => {
                ErrorBody::new(msg.clone()).with_code("rate_limit_exceeded")
            }
            // Store and server internals stay in the log.
            AppError::InternalServerError(msg) | AppError::DatabaseError(msg) => {
                log::error!("{}", msg);
                ErrorBody::new("Internal server error")
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound` and unique-constraint violations become
/// a generic `Conflict`, which stores reword for the operation at hand;
/// everything else is a `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::Conflict("Resource already exists".into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        AppError::invalid("Invalid data", errors)
    }
}

/// JWT failures other than expiry are reported as `invalid_token`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        match error.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Token(TokenError::Expired)
            }
            _ => AppError::Token(TokenError::Invalid),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(format!("Password hashing failed: {}", error))
    }
}
