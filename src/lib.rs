#![doc = "The `taskdeck` library crate."]
#![doc = ""]
#![doc = "Domain models, validation, authentication, persistence, rate limiting,"]
#![doc = "routing configuration and error handling for the Taskdeck task management API."]
#![doc = "The binary (`main.rs`) wires these together into an `HttpServer`; integration"]
#![doc = "tests build the same application around the in-memory store."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod store;
pub mod validation;

pub use crate::config::Config;
pub use crate::error::AppError;
pub use crate::store::Store;
