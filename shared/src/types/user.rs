use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::Role;

// ---------------------------------------------------------------------------
// Account status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
}

impl UserProfile {
    pub fn is_active(&self) -> bool {
        UserStatus::parse(&self.status) == Some(UserStatus::Active)
    }
}

/// Validated input for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }

    /// Names of the fields being changed, for the activity log.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.full_name.is_some() {
            fields.push("full_name");
        }
        if self.email.is_some() {
            fields.push("email");
        }
        if self.password.is_some() {
            fields.push("password");
        }
        if self.role.is_some() {
            fields.push("role");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        fields
    }
}

// ---------------------------------------------------------------------------
// Admin wire types
// ---------------------------------------------------------------------------

/// Body of `POST /api/admin/users`. Every field is required; they are kept
/// optional here so a missing one can be reported by name.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserData {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Body of `PUT /api/admin/users`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserData {
    pub id: Option<i64>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

/// Body of `DELETE /api/admin/users`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteUserData {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_records: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(current_page: u32, per_page: u32, total_records: u32) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total_records.div_ceil(per_page)
        };
        Self {
            current_page,
            total_pages,
            total_records,
            per_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<UserProfile>,
    pub pagination: Pagination,
}

/// Failures of the admin account endpoints.
#[derive(Debug)]
pub enum AdminError {
    MissingField(String),
    MissingUserId,
    InvalidRole,
    InvalidStatus,
    InvalidEmail,
    InvalidBody,
    NothingToUpdate,
    DuplicateUser,
    SelfDeactivation,
    SelfDeletion,
    UserNotFound,
    DatabaseError,
}

impl AdminError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::MissingUserId => "MISSING_USER_ID",
            Self::InvalidRole => "INVALID_ROLE",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidBody => "INVALID_BODY",
            Self::NothingToUpdate => "NOTHING_TO_UPDATE",
            Self::DuplicateUser => "DUPLICATE_USER",
            Self::SelfDeactivation => "SELF_DEACTIVATION",
            Self::SelfDeletion => "SELF_DELETION",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::MissingUserId => "A user id is required".to_string(),
            Self::InvalidRole => "Role must be one of viewer, staff, admin".to_string(),
            Self::InvalidStatus => "Status must be active or inactive".to_string(),
            Self::InvalidEmail => "Email address is not valid".to_string(),
            Self::InvalidBody => "Request body is not valid JSON".to_string(),
            Self::NothingToUpdate => "No fields to update".to_string(),
            Self::DuplicateUser => "Username or email already in use".to_string(),
            Self::SelfDeactivation => "You cannot deactivate your own account".to_string(),
            Self::SelfDeletion => "You cannot delete your own account".to_string(),
            Self::UserNotFound => "User not found".to_string(),
            Self::DatabaseError => "Database error occurred".to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::UserNotFound => 404,
            Self::DuplicateUser => 409,
            Self::DatabaseError => 500,
            _ => 400,
        }
    }

    pub fn to_response(&self) -> crate::types::ErrorResponse {
        crate::types::ErrorResponse::new(self.to_code(), &self.to_message())
    }
}
