//! # Caller Identity
//!
//! The core consumes identity from an external claims provider; it never
//! manages credentials itself. Admin-only operations compare the caller's
//! coarse permission level against the configured threshold.

use async_trait::async_trait;

use crate::config::AuthConfig;
use crate::error::{CoreError, Result};

/// Resolved caller identity with a coarse permission level.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub permission_level: u8,
}

impl Identity {
    pub fn new(uid: impl Into<String>, permission_level: u8) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            permission_level,
        }
    }

    /// Identity used by scheduled jobs when they invoke the dispatch
    /// pipeline on their own behalf.
    pub fn system() -> Self {
        Self::new(crate::constants::SYSTEM_ACTOR, u8::MAX)
    }
}

/// Seam to the external identity/claims provider: bearer token in,
/// identity out. Token validation details live behind this trait.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, bearer_token: &str) -> Result<Identity>;
}

/// Check the caller against the admin threshold.
pub fn require_admin(identity: &Identity, config: &AuthConfig) -> Result<()> {
    if identity.permission_level >= config.admin_permission_level {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            required: config.admin_permission_level,
            actual: identity.permission_level,
        })
    }
}
