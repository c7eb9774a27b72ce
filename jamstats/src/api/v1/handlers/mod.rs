pub mod admin;
pub(crate) mod health;
pub mod query;
pub mod sessions;

pub use health::health_check;
