use serde::{Deserialize, Serialize};

use crate::types::user::UserProfile;

// ---------------------------------------------------------------------------
// Login wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LoginData {
    /// Username or email address.
    #[serde(default, alias = "email")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Successful / failed login response envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    Success {
        user: UserProfile,
        /// Signed bearer token for the `Authorization` header.
        token: String,
        /// Unix seconds at which `token` stops verifying.
        expires_at: i64,
        expires_in: u64,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Response of `POST /api/auth/verify`.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: &'static str,
    pub message: String,
    pub user: UserProfile,
    pub expires_at: i64,
}

// ---------------------------------------------------------------------------
// Login errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum LoginError {
    InvalidCredentials,
    AccountDisabled,
    UserNotFound,
    MissingField(String),
    InvalidBody,
    DatabaseError,
    InternalError,
}

impl LoginError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidBody => "INVALID_BODY",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Invalid username or password".to_string(),
            Self::AccountDisabled => "This account has been disabled".to_string(),
            Self::UserNotFound => "User not found".to_string(),
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::InvalidBody => "Request body could not be parsed".to_string(),
            Self::DatabaseError => "Database error occurred".to_string(),
            Self::InternalError => "An internal error occurred".to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials => 401,
            Self::AccountDisabled => 403,
            Self::UserNotFound => 404,
            Self::MissingField(_) | Self::InvalidBody => 400,
            Self::DatabaseError | Self::InternalError => 500,
        }
    }

    pub fn to_response(&self) -> LoginResponse {
        LoginResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
        }
    }
}
