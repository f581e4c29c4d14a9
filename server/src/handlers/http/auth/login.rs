use anyhow::Result;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use tracing::{error, info, warn};

use certreg_shared::types::{LoginData, LoginError, LoginResponse, TokenClaims, UserProfile};

use crate::AppState;
use crate::database;
use crate::handlers::http::utils::{
    ResponseBody, deliver_serialized_json, get_client_ip, log_activity, parse_body,
};

/// A successful login: the fresh profile and the token handed back.
struct IssuedLogin {
    user: UserProfile,
    token: String,
    expires_at: i64,
    expires_in: u64,
}

/// POST /api/auth/login
pub async fn handle_login(req: Request<Incoming>, state: AppState) -> Result<Response<ResponseBody>> {
    info!("Processing login request");

    let client_ip = get_client_ip(&req);

    let mut login_data: LoginData = match parse_body(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Login body rejected: {}", e);
            return deliver_login_error(LoginError::InvalidBody);
        }
    };
    login_data.username = database::sanitize_string(&login_data.username);

    if let Err(login_error) = validate_login(&login_data) {
        warn!("Login validation failed: {}", login_error.to_code());
        return deliver_login_error(login_error);
    }

    match attempt_login(&login_data, &state).await {
        Ok(issued) => {
            info!(
                "User logged in successfully: {} (ID: {})",
                issued.user.username, issued.user.id
            );
            log_activity(
                "user_login",
                client_ip.as_deref(),
                json!({ "user_id": issued.user.id, "username": issued.user.username }),
            );

            deliver_serialized_json(
                &LoginResponse::Success {
                    user: issued.user,
                    token: issued.token,
                    expires_at: issued.expires_at,
                    expires_in: issued.expires_in,
                    message: "Login successful".to_string(),
                },
                StatusCode::OK,
            )
        }
        Err(login_error) => {
            warn!("Login failed: {}", login_error.to_code());
            deliver_login_error(login_error)
        }
    }
}

fn validate_login(data: &LoginData) -> std::result::Result<(), LoginError> {
    if data.username.is_empty() {
        return Err(LoginError::MissingField("username".to_string()));
    }

    if data.password.is_empty() {
        return Err(LoginError::MissingField("password".to_string()));
    }

    Ok(())
}

async fn attempt_login(
    data: &LoginData,
    state: &AppState,
) -> std::result::Result<IssuedLogin, LoginError> {
    info!("Attempting login for user: {}", data.username);

    let found = database::get_user_auth(&state.db, &data.username)
        .await
        .map_err(|e| {
            error!("Database error getting user auth: {}", e);
            LoginError::DatabaseError
        })?;

    let Some(user_auth) = found else {
        warn!("User not found: {}", data.username);
        database::burn_password_check(&data.password);
        return Err(LoginError::InvalidCredentials);
    };

    let password_valid = database::verify_password(&user_auth.password_hash, &data.password)
        .map_err(|e| {
            error!("Password verification error: {}", e);
            LoginError::InternalError
        })?;

    if !password_valid {
        warn!("Invalid password for user: {}", data.username);
        return Err(LoginError::InvalidCredentials);
    }

    if !user_auth.is_active() {
        warn!("Disabled account attempted login: {}", data.username);
        return Err(LoginError::AccountDisabled);
    }

    let now = database::get_timestamp();

    // Don't fail the login over this
    if let Err(e) = database::update_last_login(&state.db, user_auth.id).await {
        error!("Failed to update last login: {}", e);
    }

    let mut user = user_auth.into_profile();
    user.last_login = Some(now);

    let expires_in = state.config.read().await.auth.token_expiry_secs();
    let expires_at = now.saturating_add(i64::try_from(expires_in).unwrap_or(i64::MAX));

    let claims = TokenClaims {
        user_id: user.id,
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        iat: now,
        exp: expires_at,
    };

    let token = state.tokens.issue(&claims).map_err(|e| {
        error!("Failed to issue token: {}", e);
        LoginError::InternalError
    })?;

    Ok(IssuedLogin {
        user,
        token,
        expires_at,
        expires_in,
    })
}

fn deliver_login_error(login_error: LoginError) -> Result<Response<ResponseBody>> {
    let status = StatusCode::from_u16(login_error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    deliver_serialized_json(&login_error.to_response(), status)
}
