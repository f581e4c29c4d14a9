use anyhow::Result;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use tracing::info;

use certreg_shared::types::TokenClaims;

use crate::AppState;
use crate::handlers::http::utils::{ResponseBody, deliver_success_json, get_client_ip, log_activity};

/// POST /api/auth/logout
///
/// Tokens are stateless, so there is nothing to revoke. The client drops its
/// copy and the token ages out at `exp`.
pub async fn handle_logout(
    req: Request<Incoming>,
    _state: AppState,
    claims: TokenClaims,
) -> Result<Response<ResponseBody>> {
    info!("User logged out: {} (ID: {})", claims.username, claims.user_id);

    log_activity(
        "user_logout",
        get_client_ip(&req).as_deref(),
        json!({ "user_id": claims.user_id, "username": claims.username }),
    );

    deliver_success_json("Logged out successfully", None, StatusCode::OK)
}
