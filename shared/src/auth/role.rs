use std::fmt;

use serde::{Deserialize, Serialize};

/// Level assigned to a role name that is not one of the known roles when it
/// appears as the *required* role. Higher than every real level so the check
/// fails closed.
pub const UNKNOWN_REQUIRED_LEVEL: u8 = u8::MAX;

/// Level assigned to an unknown *actual* role.
pub const UNKNOWN_ACTUAL_LEVEL: u8 = 0;

/// Account roles, ordered from least to most privileged.
///
/// Access checks are always "at least this role", never equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Exact, case-sensitive parse of a wire role name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(Role::Viewer),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Staff => 2,
            Role::Admin => 3,
        }
    }

    /// `true` when this role is at least as privileged as `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    pub fn all() -> &'static [Role] {
        &[Role::Viewer, Role::Staff, Role::Admin]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String-level permission check used at the request boundary, where role
/// names arrive untyped from token claims.
pub fn has_permission(actual: &str, required: &str) -> bool {
    let actual_level = Role::parse(actual)
        .map(|r| r.level())
        .unwrap_or(UNKNOWN_ACTUAL_LEVEL);
    let required_level = Role::parse(required)
        .map(|r| r.level())
        .unwrap_or(UNKNOWN_REQUIRED_LEVEL);

    actual_level >= required_level
}
