use certreg_shared::types::{NewUser, Pagination, UserPage, UserProfile, UserStatus, UserUpdate};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};

use super::utils::{get_timestamp, hash_password, like_pattern};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

const PROFILE_COLUMNS: &str = "id, username, full_name, email, role, status, created_at, last_login";

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("username or email already in use")]
    Duplicate,

    #[error("user not found")]
    NotFound,

    #[error("no fields to update")]
    NothingToUpdate,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Public columns of a `users` row.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    full_name: String,
    email: String,
    role: String,
    status: String,
    created_at: i64,
    last_login: Option<i64>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            email: row.email,
            role: row.role,
            status: row.status,
            created_at: row.created_at,
            last_login: row.last_login,
        }
    }
}

/// Everything the login path needs: the profile plus the password hash.
#[derive(Debug, Clone, FromRow)]
pub struct UserAuth {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
    pub password_hash: String,
}

impl UserAuth {
    pub fn is_active(&self) -> bool {
        UserStatus::parse(&self.status) == Some(UserStatus::Active)
    }

    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            role: self.role,
            status: self.status,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// Look up login data by username or email.
pub async fn get_user_auth(pool: &SqlitePool, login: &str) -> Result<Option<UserAuth>, sqlx::Error> {
    let sql = format!(
        "SELECT {}, password_hash FROM users WHERE username = ? OR email = ? LIMIT 1",
        PROFILE_COLUMNS
    );
    sqlx::query_as::<_, UserAuth>(&sql)
        .bind(login)
        .bind(login)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<UserProfile>, sqlx::Error> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", PROFILE_COLUMNS);
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(UserProfile::from))
}

pub async fn update_last_login(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(get_timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

/// Insert a new active user and return its id.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<i64, UserStoreError> {
    // Logins match either column, so a name may not collide with any
    // existing username or email.
    let taken: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE username IN (?1, ?2) OR email IN (?1, ?2)",
    )
    .bind(&user.username)
    .bind(&user.email)
    .fetch_one(pool)
    .await?;
    if taken > 0 {
        return Err(UserStoreError::Duplicate);
    }

    let password_hash =
        hash_password(&user.password).map_err(|e| UserStoreError::Hash(e.to_string()))?;
    let now = get_timestamp();

    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, full_name, email, role, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'active', ?, ?)",
    )
    .bind(&user.username)
    .bind(&password_hash)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_unique_violation)?;

    let id = result.last_insert_rowid();
    info!("Created user {} (ID: {}, role: {})", user.username, id, user.role);
    Ok(id)
}

/// Apply a partial update. Only the fields that are `Some` change.
pub async fn update_user(
    pool: &SqlitePool,
    id: i64,
    update: &UserUpdate,
) -> Result<(), UserStoreError> {
    if update.is_empty() {
        return Err(UserStoreError::NothingToUpdate);
    }

    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(UserStoreError::NotFound);
    }

    if let Some(email) = &update.email {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE (email = ?1 OR username = ?1) AND id != ?2",
        )
        .bind(email)
        .bind(id)
        .fetch_one(pool)
        .await?;
        if taken > 0 {
            return Err(UserStoreError::Duplicate);
        }
    }

    let password_hash = match &update.password {
        Some(password) => {
            Some(hash_password(password).map_err(|e| UserStoreError::Hash(e.to_string()))?)
        }
        None => None,
    };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
    qb.push_bind(get_timestamp());
    if let Some(full_name) = &update.full_name {
        qb.push(", full_name = ").push_bind(full_name.clone());
    }
    if let Some(email) = &update.email {
        qb.push(", email = ").push_bind(email.clone());
    }
    if let Some(hash) = password_hash {
        qb.push(", password_hash = ").push_bind(hash);
    }
    if let Some(role) = update.role {
        qb.push(", role = ").push_bind(role.as_str());
    }
    if let Some(status) = update.status {
        qb.push(", status = ").push_bind(status.as_str());
    }
    qb.push(" WHERE id = ").push_bind(id);

    qb.build()
        .execute(pool)
        .await
        .map_err(map_unique_violation)?;

    debug!("Updated user {}: {:?}", id, update.field_names());
    Ok(())
}

pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<(), UserStoreError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(UserStoreError::NotFound);
    }
    Ok(())
}

/// Clamp raw paging input to a valid `(page, limit)` pair.
pub fn normalize_paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// One page of users, newest first, optionally filtered by a substring of
/// username, full name or email.
pub async fn list_users(
    pool: &SqlitePool,
    page: u32,
    limit: u32,
    search: Option<&str>,
) -> Result<UserPage, sqlx::Error> {
    let (page, limit) = normalize_paging(Some(page), Some(limit));
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_search(&mut count_qb, pattern.as_deref());
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {} FROM users", PROFILE_COLUMNS));
    push_search(&mut qb, pattern.as_deref());
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(i64::from(limit))
        .push(" OFFSET ")
        .push_bind(i64::from(page - 1) * i64::from(limit));

    let rows: Vec<UserRow> = qb.build_query_as().fetch_all(pool).await?;

    let total_records = u32::try_from(total).unwrap_or(u32::MAX);
    Ok(UserPage {
        users: rows.into_iter().map(UserProfile::from).collect(),
        pagination: Pagination::new(page, limit, total_records),
    })
}

fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, pattern: Option<&str>) {
    if let Some(pattern) = pattern {
        qb.push(" WHERE username LIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\' OR full_name LIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\' OR email LIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\'");
    }
}

fn map_unique_violation(err: sqlx::Error) -> UserStoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => UserStoreError::Duplicate,
        _ => UserStoreError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{connect, create_tables, verify_password};
    use certreg_shared::auth::Role;

    async fn pool() -> SqlitePool {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: format!("{}-password", username),
            full_name: format!("{} Example", username),
            email: format!("{}@example.com", username),
            role,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_user() {
        let pool = pool().await;
        let id = create_user(&pool, &new_user("alice", Role::Staff)).await.unwrap();

        let profile = get_user_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.role, "staff");
        assert_eq!(profile.status, "active");
        assert!(profile.last_login.is_none());
        assert_eq!(count_users(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn login_lookup_accepts_username_or_email() {
        let pool = pool().await;
        create_user(&pool, &new_user("bob", Role::Viewer)).await.unwrap();

        let by_name = get_user_auth(&pool, "bob").await.unwrap().unwrap();
        let by_email = get_user_auth(&pool, "bob@example.com").await.unwrap().unwrap();
        assert_eq!(by_name.id, by_email.id);
        assert!(verify_password(&by_name.password_hash, "bob-password").unwrap());
        assert!(get_user_auth(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let pool = pool().await;
        create_user(&pool, &new_user("carol", Role::Viewer)).await.unwrap();

        let same_name = new_user("carol", Role::Viewer);
        assert!(matches!(
            create_user(&pool, &same_name).await,
            Err(UserStoreError::Duplicate)
        ));

        let mut same_email = new_user("carol2", Role::Viewer);
        same_email.email = "carol@example.com".into();
        assert!(matches!(
            create_user(&pool, &same_email).await,
            Err(UserStoreError::Duplicate)
        ));
    }

    #[tokio::test]
    async fn username_and_email_may_not_cross_collide() {
        let pool = pool().await;
        create_user(&pool, &new_user("alice", Role::Staff)).await.unwrap();

        let mut named_like_email = new_user("mallory", Role::Viewer);
        named_like_email.username = "alice@example.com".into();
        assert!(matches!(
            create_user(&pool, &named_like_email).await,
            Err(UserStoreError::Duplicate)
        ));

        let mut emailed_like_name = new_user("bob", Role::Viewer);
        emailed_like_name.email = "alice".into();
        assert!(matches!(
            create_user(&pool, &emailed_like_name).await,
            Err(UserStoreError::Duplicate)
        ));

        let bob = create_user(&pool, &new_user("bob", Role::Viewer)).await.unwrap();
        let update = UserUpdate {
            email: Some("alice".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_user(&pool, bob, &update).await,
            Err(UserStoreError::Duplicate)
        ));

        let auth = get_user_auth(&pool, "alice@example.com").await.unwrap().unwrap();
        assert_eq!(auth.username, "alice");
        assert_eq!(count_users(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn last_login_is_recorded() {
        let pool = pool().await;
        let id = create_user(&pool, &new_user("dave", Role::Viewer)).await.unwrap();
        update_last_login(&pool, id).await.unwrap();
        let profile = get_user_by_id(&pool, id).await.unwrap().unwrap();
        assert!(profile.last_login.is_some());
    }

    #[tokio::test]
    async fn partial_update_changes_only_given_fields() {
        let pool = pool().await;
        let id = create_user(&pool, &new_user("erin", Role::Viewer)).await.unwrap();

        let update = UserUpdate {
            role: Some(Role::Admin),
            status: Some(UserStatus::Inactive),
            ..Default::default()
        };
        update_user(&pool, id, &update).await.unwrap();

        let profile = get_user_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(profile.role, "admin");
        assert_eq!(profile.status, "inactive");
        assert_eq!(profile.full_name, "erin Example");
        assert_eq!(profile.email, "erin@example.com");
    }

    #[tokio::test]
    async fn password_update_rehashes() {
        let pool = pool().await;
        let id = create_user(&pool, &new_user("fay", Role::Viewer)).await.unwrap();
        let update = UserUpdate {
            password: Some("brand-new".into()),
            ..Default::default()
        };
        update_user(&pool, id, &update).await.unwrap();

        let auth = get_user_auth(&pool, "fay").await.unwrap().unwrap();
        assert!(verify_password(&auth.password_hash, "brand-new").unwrap());
        assert!(!verify_password(&auth.password_hash, "fay-password").unwrap());
    }

    #[tokio::test]
    async fn email_must_stay_unique_among_other_users() {
        let pool = pool().await;
        create_user(&pool, &new_user("gil", Role::Viewer)).await.unwrap();
        let id = create_user(&pool, &new_user("hal", Role::Viewer)).await.unwrap();

        let clash = UserUpdate {
            email: Some("gil@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_user(&pool, id, &clash).await,
            Err(UserStoreError::Duplicate)
        ));

        let own = UserUpdate {
            email: Some("hal@example.com".into()),
            ..Default::default()
        };
        update_user(&pool, id, &own).await.unwrap();
    }

    #[tokio::test]
    async fn empty_update_and_missing_user_are_errors() {
        let pool = pool().await;
        let id = create_user(&pool, &new_user("ivy", Role::Viewer)).await.unwrap();

        assert!(matches!(
            update_user(&pool, id, &UserUpdate::default()).await,
            Err(UserStoreError::NothingToUpdate)
        ));

        let update = UserUpdate {
            full_name: Some("Nobody".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_user(&pool, id + 100, &update).await,
            Err(UserStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_removes_user_once() {
        let pool = pool().await;
        let id = create_user(&pool, &new_user("jan", Role::Viewer)).await.unwrap();

        delete_user(&pool, id).await.unwrap();
        assert!(get_user_by_id(&pool, id).await.unwrap().is_none());
        assert!(matches!(
            delete_user(&pool, id).await,
            Err(UserStoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_paginates_newest_first() {
        let pool = pool().await;
        for i in 0..5 {
            create_user(&pool, &new_user(&format!("user{}", i), Role::Viewer))
                .await
                .unwrap();
        }

        let first = list_users(&pool, 1, 2, None).await.unwrap();
        assert_eq!(first.users.len(), 2);
        assert_eq!(first.users[0].username, "user4");
        assert_eq!(first.pagination.total_records, 5);
        assert_eq!(first.pagination.total_pages, 3);
        assert_eq!(first.pagination.per_page, 2);

        let last = list_users(&pool, 3, 2, None).await.unwrap();
        assert_eq!(last.users.len(), 1);
        assert_eq!(last.users[0].username, "user0");

        let past_end = list_users(&pool, 9, 2, None).await.unwrap();
        assert!(past_end.users.is_empty());
    }

    #[tokio::test]
    async fn list_search_matches_any_text_column() {
        let pool = pool().await;
        create_user(&pool, &new_user("kim", Role::Viewer)).await.unwrap();
        create_user(&pool, &new_user("lee", Role::Viewer)).await.unwrap();
        let mut odd = new_user("max", Role::Viewer);
        odd.full_name = "Maxine 100%".into();
        create_user(&pool, &odd).await.unwrap();

        let by_name = list_users(&pool, 1, 20, Some("kim")).await.unwrap();
        assert_eq!(by_name.pagination.total_records, 1);

        let by_email = list_users(&pool, 1, 20, Some("@example.com")).await.unwrap();
        assert_eq!(by_email.pagination.total_records, 3);

        let literal_percent = list_users(&pool, 1, 20, Some("0%")).await.unwrap();
        assert_eq!(literal_percent.users.len(), 1);
        assert_eq!(literal_percent.users[0].username, "max");

        let blank = list_users(&pool, 1, 20, Some("   ")).await.unwrap();
        assert_eq!(blank.pagination.total_records, 3);
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(normalize_paging(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(normalize_paging(Some(0), Some(0)), (1, 1));
        assert_eq!(normalize_paging(Some(3), Some(500)), (3, MAX_PAGE_SIZE));
    }
}
