use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Claims embedded in every token issued at login.
///
/// The token is the only session state: nothing about it is stored
/// server-side, so a changed role or name only shows up after the user logs
/// in again and receives a fresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Numeric user ID (matches `users.id`).
    pub user_id: i64,

    pub username: String,

    pub full_name: String,

    pub email: String,

    /// Role name as stored on the account. Kept as a plain string so a token
    /// carrying an unknown role still decodes and then fails every
    /// permission check.
    pub role: String,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiry (unix seconds). The token is valid while `exp > now`.
    pub exp: i64,
}

impl TokenClaims {
    /// Typed view of `role`, `None` for names outside the hierarchy.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// `true` when the holder's role is at least `required`.
    pub fn permits(&self, required: Role) -> bool {
        self.role().is_some_and(|actual| actual.satisfies(required))
    }
}
