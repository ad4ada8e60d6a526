//! HTTP request handlers.

pub mod api_auth;
mod ops;
pub(crate) mod problem_details;
pub mod scope;
pub mod v1;

pub use ops::{livez, version};
