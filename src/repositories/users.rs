use sqlx::PgPool;

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "id, email, hashed_password, full_name, role, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct CreateUser {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub(crate) struct UpdateUser {
    pub(crate) hashed_password: Option<String>,
    pub(crate) role: Option<UserRole>,
    pub(crate) is_active: Option<bool>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_many(pool: &PgPool, ids: &[String]) -> Result<Vec<User>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE id = ANY($1) ORDER BY created_at"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

/// Active users, optionally narrowed to one role. `None` selects everyone.
pub(crate) async fn list_active(
    pool: &PgPool,
    role: Option<UserRole>,
) -> Result<Vec<User>, sqlx::Error> {
    match role {
        Some(role) => {
            sqlx::query_as::<_, User>(&format!(
                "SELECT {COLUMNS} FROM users WHERE is_active = TRUE AND role = $1 ORDER BY created_at"
            ))
            .bind(role)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, User>(&format!(
                "SELECT {COLUMNS} FROM users WHERE is_active = TRUE ORDER BY created_at"
            ))
            .fetch_all(pool)
            .await
        }
    }
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, email, hashed_password, full_name, role, is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.full_name)
    .bind(params.role)
    .bind(params.is_active)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update(pool: &PgPool, id: &str, params: UpdateUser) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET
            hashed_password = COALESCE($1, hashed_password),
            role = COALESCE($2, role),
            is_active = COALESCE($3, is_active),
            updated_at = $4
         WHERE id = $5",
    )
    .bind(params.hashed_password)
    .bind(params.role)
    .bind(params.is_active)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
