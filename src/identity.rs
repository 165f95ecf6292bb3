use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Campus roles, as issued by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Faculty,
    Staff,
    Administrator,
    Visitor,
}

/// Authenticated caller identity, supplied by the auth middleware at the
/// boundary. The core trusts it as-is and never re-derives identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Ulid,
    pub role: Role,
}

impl RequestContext {
    pub fn new(user_id: Ulid, role: Role) -> Self {
        Self { user_id, role }
    }
}
