use anyhow::Result;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use tracing::{error, info, warn};

use certreg_shared::auth::Role;
use certreg_shared::types::{
    AdminError, CreateUserData, DeleteUserData, NewUser, TokenClaims, UpdateUserData,
    UserStatus, UserUpdate,
};

use crate::AppState;
use crate::database::{self, UserStoreError};
use crate::handlers::http::utils::{
    ResponseBody, deliver_serialized_json, deliver_success_json, get_client_ip, log_activity,
    parse_body, query_params,
};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/admin/users?page=&limit=&search=
pub async fn handle_list_users(
    req: Request<Incoming>,
    state: AppState,
    claims: TokenClaims,
) -> Result<Response<ResponseBody>> {
    let params = query_params(&req);
    let page = params.get("page").and_then(|p| p.parse::<u32>().ok());
    let limit = params.get("limit").and_then(|l| l.parse::<u32>().ok());
    let (page, limit) = database::normalize_paging(page, limit);
    let search = params.get("search").map(String::as_str);

    info!(
        "Admin {} listing users (page {}, limit {}, search {:?})",
        claims.username, page, limit, search
    );

    match database::list_users(&state.db, page, limit, search).await {
        Ok(result) => deliver_serialized_json(
            &json!({
                "status": "success",
                "users": result.users,
                "pagination": result.pagination,
            }),
            StatusCode::OK,
        ),
        Err(e) => {
            error!("Failed to list users: {}", e);
            deliver_admin_error(AdminError::DatabaseError)
        }
    }
}

/// POST /api/admin/users
pub async fn handle_create_user(
    req: Request<Incoming>,
    state: AppState,
    claims: TokenClaims,
) -> Result<Response<ResponseBody>> {
    let client_ip = get_client_ip(&req);

    let data: CreateUserData = match parse_body(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Create user body rejected: {}", e);
            return deliver_admin_error(AdminError::InvalidBody);
        }
    };

    let new_user = match build_new_user(data) {
        Ok(user) => user,
        Err(e) => return deliver_admin_error(e),
    };

    match database::create_user(&state.db, &new_user).await {
        Ok(user_id) => {
            log_activity(
                "user_created_by_admin",
                client_ip.as_deref(),
                json!({
                    "new_user_id": user_id,
                    "username": new_user.username,
                    "role": new_user.role,
                    "created_by": claims.user_id,
                }),
            );
            deliver_success_json(
                "User created",
                Some(json!({ "user_id": user_id })),
                StatusCode::CREATED,
            )
        }
        Err(e) => deliver_admin_error(store_error(e)),
    }
}

/// PUT /api/admin/users
pub async fn handle_update_user(
    req: Request<Incoming>,
    state: AppState,
    claims: TokenClaims,
) -> Result<Response<ResponseBody>> {
    let client_ip = get_client_ip(&req);

    let data: UpdateUserData = match parse_body(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Update user body rejected: {}", e);
            return deliver_admin_error(AdminError::InvalidBody);
        }
    };

    let (user_id, update) = match build_update(&data, claims.user_id) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Admin {} update rejected: {}", claims.username, e.to_code());
            return deliver_admin_error(e);
        }
    };

    match database::update_user(&state.db, user_id, &update).await {
        Ok(()) => {
            log_activity(
                "user_updated_by_admin",
                client_ip.as_deref(),
                json!({
                    "updated_user_id": user_id,
                    "updated_by": claims.user_id,
                    "updated_fields": update.field_names(),
                }),
            );
            deliver_success_json("User updated", None, StatusCode::OK)
        }
        Err(e) => deliver_admin_error(store_error(e)),
    }
}

/// DELETE /api/admin/users
pub async fn handle_delete_user(
    req: Request<Incoming>,
    state: AppState,
    claims: TokenClaims,
) -> Result<Response<ResponseBody>> {
    let client_ip = get_client_ip(&req);

    let data: DeleteUserData = match parse_body(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Delete user body rejected: {}", e);
            return deliver_admin_error(AdminError::InvalidBody);
        }
    };

    let user_id = match delete_target(&data, claims.user_id) {
        Ok(id) => id,
        Err(e) => return deliver_admin_error(e),
    };

    let target = match database::get_user_by_id(&state.db, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return deliver_admin_error(AdminError::UserNotFound),
        Err(e) => {
            error!("Failed to load user {} for deletion: {}", user_id, e);
            return deliver_admin_error(AdminError::DatabaseError);
        }
    };

    match database::delete_user(&state.db, user_id).await {
        Ok(()) => {
            log_activity(
                "user_deleted_by_admin",
                client_ip.as_deref(),
                json!({
                    "deleted_user_id": user_id,
                    "deleted_username": target.username,
                    "deleted_by": claims.user_id,
                }),
            );
            deliver_success_json("User deleted", None, StatusCode::OK)
        }
        Err(e) => deliver_admin_error(store_error(e)),
    }
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

fn required(value: Option<String>, field: &str) -> std::result::Result<String, AdminError> {
    value
        .map(|v| database::sanitize_string(&v))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AdminError::MissingField(field.to_string()))
}

/// Treat blank strings as "not provided".
fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|v| database::sanitize_string(v))
        .filter(|v| !v.is_empty())
}

fn build_new_user(data: CreateUserData) -> std::result::Result<NewUser, AdminError> {
    let username = required(data.username, "username")?;
    let password = data
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AdminError::MissingField("password".to_string()))?;
    let full_name = required(data.full_name, "full_name")?;
    let email = required(data.email, "email")?;
    let role = required(data.role, "role")?;

    if !database::is_valid_email(&email) {
        return Err(AdminError::InvalidEmail);
    }
    let role = Role::parse(&role).ok_or(AdminError::InvalidRole)?;

    Ok(NewUser {
        username,
        password,
        full_name,
        email,
        role,
    })
}

fn build_update(
    data: &UpdateUserData,
    acting_user: i64,
) -> std::result::Result<(i64, UserUpdate), AdminError> {
    let user_id = data
        .id
        .filter(|id| *id > 0)
        .ok_or(AdminError::MissingUserId)?;

    if user_id == acting_user
        && data
            .status
            .as_deref()
            .is_some_and(|s| s != UserStatus::Active.as_str())
    {
        return Err(AdminError::SelfDeactivation);
    }

    let role = match optional(data.role.as_ref()) {
        Some(role) => Some(Role::parse(&role).ok_or(AdminError::InvalidRole)?),
        None => None,
    };

    let status = match data.status.as_deref() {
        Some(status) => Some(UserStatus::parse(status).ok_or(AdminError::InvalidStatus)?),
        None => None,
    };

    let email = optional(data.email.as_ref());
    if email.as_deref().is_some_and(|e| !database::is_valid_email(e)) {
        return Err(AdminError::InvalidEmail);
    }

    let update = UserUpdate {
        full_name: optional(data.full_name.as_ref()),
        email,
        password: data.password.clone().filter(|p| !p.is_empty()),
        role,
        status,
    };

    if update.is_empty() {
        return Err(AdminError::NothingToUpdate);
    }

    Ok((user_id, update))
}

fn delete_target(data: &DeleteUserData, acting_user: i64) -> std::result::Result<i64, AdminError> {
    let user_id = data
        .id
        .filter(|id| *id > 0)
        .ok_or(AdminError::MissingUserId)?;

    if user_id == acting_user {
        return Err(AdminError::SelfDeletion);
    }

    Ok(user_id)
}

fn store_error(e: UserStoreError) -> AdminError {
    match e {
        UserStoreError::Duplicate => AdminError::DuplicateUser,
        UserStoreError::NotFound => AdminError::UserNotFound,
        UserStoreError::NothingToUpdate => AdminError::NothingToUpdate,
        UserStoreError::Hash(_) | UserStoreError::Database(_) => {
            error!("User store failure: {}", e);
            AdminError::DatabaseError
        }
    }
}

fn deliver_admin_error(e: AdminError) -> Result<Response<ResponseBody>> {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    deliver_serialized_json(&e.to_response(), status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_data() -> CreateUserData {
        CreateUserData {
            username: Some("  newbie ".into()),
            password: Some("pw".into()),
            full_name: Some("New Bie".into()),
            email: Some("newbie@example.com".into()),
            role: Some("staff".into()),
        }
    }

    #[test]
    fn new_user_is_trimmed_and_typed() {
        let user = build_new_user(create_data()).unwrap();
        assert_eq!(user.username, "newbie");
        assert_eq!(user.role, Role::Staff);
    }

    #[test]
    fn new_user_requires_every_field() {
        let mut data = create_data();
        data.full_name = Some("   ".into());
        assert!(matches!(
            build_new_user(data),
            Err(AdminError::MissingField(f)) if f == "full_name"
        ));

        let mut data = create_data();
        data.password = None;
        assert!(matches!(
            build_new_user(data),
            Err(AdminError::MissingField(f)) if f == "password"
        ));
    }

    #[test]
    fn new_user_rejects_unknown_role_and_bad_email() {
        let mut data = create_data();
        data.role = Some("superuser".into());
        assert!(matches!(build_new_user(data), Err(AdminError::InvalidRole)));

        let mut data = create_data();
        data.email = Some("not-an-email".into());
        assert!(matches!(build_new_user(data), Err(AdminError::InvalidEmail)));
    }

    #[test]
    fn update_requires_positive_id() {
        let data = UpdateUserData {
            full_name: Some("x".into()),
            ..Default::default()
        };
        assert!(matches!(build_update(&data, 1), Err(AdminError::MissingUserId)));

        let data = UpdateUserData {
            id: Some(0),
            full_name: Some("x".into()),
            ..Default::default()
        };
        assert!(matches!(build_update(&data, 1), Err(AdminError::MissingUserId)));
    }

    #[test]
    fn admin_cannot_deactivate_self() {
        let data = UpdateUserData {
            id: Some(7),
            status: Some("inactive".into()),
            ..Default::default()
        };
        assert!(matches!(build_update(&data, 7), Err(AdminError::SelfDeactivation)));

        let (id, update) = build_update(&data, 1).unwrap();
        assert_eq!(id, 7);
        assert_eq!(update.status, Some(UserStatus::Inactive));
    }

    #[test]
    fn update_validates_role_and_status() {
        let data = UpdateUserData {
            id: Some(3),
            role: Some("owner".into()),
            ..Default::default()
        };
        assert!(matches!(build_update(&data, 1), Err(AdminError::InvalidRole)));

        let data = UpdateUserData {
            id: Some(3),
            status: Some("banned".into()),
            ..Default::default()
        };
        assert!(matches!(build_update(&data, 1), Err(AdminError::InvalidStatus)));
    }

    #[test]
    fn blank_fields_do_not_count_as_updates() {
        let data = UpdateUserData {
            id: Some(3),
            full_name: Some("  ".into()),
            password: Some(String::new()),
            role: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(build_update(&data, 1), Err(AdminError::NothingToUpdate)));
    }

    #[test]
    fn delete_guards() {
        assert!(matches!(
            delete_target(&DeleteUserData { id: None }, 1),
            Err(AdminError::MissingUserId)
        ));
        assert!(matches!(
            delete_target(&DeleteUserData { id: Some(1) }, 1),
            Err(AdminError::SelfDeletion)
        ));
        assert_eq!(delete_target(&DeleteUserData { id: Some(2) }, 1).unwrap(), 2);
    }

    #[test]
    fn store_errors_map_to_admin_errors() {
        assert!(matches!(
            store_error(UserStoreError::Duplicate),
            AdminError::DuplicateUser
        ));
        assert!(matches!(
            store_error(UserStoreError::NotFound),
            AdminError::UserNotFound
        ));
    }
}
