//! User records mirrored from the auth provider

use alumni_common::db::{Role, User};
use alumni_common::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Insert or refresh a user after successful authentication
///
/// `promote` grants the admin role (configured admin email); an existing
/// admin is never demoted here.
pub async fn upsert_user(
    pool: &SqlitePool,
    id: &str,
    email: &str,
    name: Option<&str>,
    promote: bool,
) -> Result<User> {
    let now = Utc::now();
    let initial_role = if promote { Role::Admin } else { Role::Member };

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, role, created_at, last_seen_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            name = COALESCE(excluded.name, users.name),
            last_seen_at = excluded.last_seen_at,
            role = CASE WHEN ? THEN 'admin' ELSE users.role END
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(name)
    .bind(initial_role)
    .bind(now)
    .bind(now)
    .bind(promote)
    .execute(pool)
    .await?;

    get_user(pool, id)
        .await?
        .ok_or_else(|| alumni_common::Error::Internal(format!("User {} vanished after upsert", id)))
}

pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, name, role, created_at, last_seen_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, name, role, created_at, last_seen_at FROM users
         WHERE email = ? COLLATE NOCASE ORDER BY created_at LIMIT 1",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, email, name, role, created_at, last_seen_at FROM users
         ORDER BY email COLLATE NOCASE",
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Returns false when the user does not exist
pub async fn set_role(pool: &SqlitePool, id: &str, role: Role) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
