pub mod auth;

pub use auth::{require_admin_identity, resolve_identity};
