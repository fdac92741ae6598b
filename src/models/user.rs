//! User records, read-only from the core's perspective. Identity and claims
//! management live in the external identity provider.

use serde::{Deserialize, Serialize};

/// Role string for branch administrators, matched by the escalation sweep.
pub const BRANCH_ADMIN_ROLE: &str = "branch_admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
}
