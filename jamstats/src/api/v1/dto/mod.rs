//! v1 API Data Transfer Objects.
//!
//! Wire format for the v1 REST API, kept apart from the pipeline types in
//! `src/models/`.

pub mod admin;
pub mod query;
pub mod sessions;

pub use admin::*;
pub use query::*;
pub use sessions::*;
