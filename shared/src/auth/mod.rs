//! Token service and access-control primitives.
//!
//! Everything here is pure: no I/O, no shared mutable state. The server
//! builds one [`TokenService`] at start-up and calls [`extract_bearer`] and
//! [`TokenService::verify`] on every gated request, then checks the role
//! through `TokenClaims::permits`. [`has_permission`] is the same check on
//! raw role names.

pub mod bearer;
pub mod role;
pub mod token;

pub use self::bearer::{BEARER_PREFIX, extract_bearer};
pub use self::role::{Role, has_permission};
pub use self::token::{TOKEN_HEADER, TokenError, TokenService, unix_now};
