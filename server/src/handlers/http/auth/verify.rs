use anyhow::Result;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error, warn};

use certreg_shared::types::{LoginError, TokenClaims, VerifyResponse};

use crate::AppState;
use crate::database;
use crate::handlers::http::utils::{ResponseBody, deliver_serialized_json};

/// POST /api/auth/verify
///
/// The router has already checked the token; this re-reads the account so a
/// deleted or disabled user stops verifying even while the token is live.
pub async fn handle_verify(
    _req: Request<Incoming>,
    state: AppState,
    claims: TokenClaims,
) -> Result<Response<ResponseBody>> {
    debug!("Verifying token for user ID {}", claims.user_id);

    let login_error = match database::get_user_by_id(&state.db, claims.user_id).await {
        Ok(Some(user)) if user.is_active() => {
            return deliver_serialized_json(
                &VerifyResponse {
                    status: "success",
                    message: "Token is valid".to_string(),
                    user,
                    expires_at: claims.exp,
                },
                StatusCode::OK,
            );
        }
        Ok(Some(_)) => {
            warn!("Token presented for disabled account {}", claims.user_id);
            LoginError::AccountDisabled
        }
        Ok(None) => {
            warn!("Token presented for unknown user {}", claims.user_id);
            LoginError::UserNotFound
        }
        Err(e) => {
            error!("Database error during verify: {}", e);
            LoginError::DatabaseError
        }
    };

    let status = StatusCode::from_u16(login_error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    deliver_serialized_json(&login_error.to_response(), status)
}
