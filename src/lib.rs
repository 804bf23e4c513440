//! todanni API — stateless access-token authorization.
//!
//! Library crate shared by the `todanni` binary and the integration tests in `tests/`.

pub mod api;
pub mod config;
pub mod errors;
pub mod store;
pub mod token;
