use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::TokenTransaction;
use crate::db::types::TokenKind;

const COLUMNS: &str = "id, user_id, amount, kind, reason, metadata, created_at";

#[derive(Debug, Clone)]
pub(crate) struct CreateTokenTransaction {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) amount: i32,
    pub(crate) kind: TokenKind,
    pub(crate) reason: String,
    pub(crate) metadata: serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    pool: &PgPool,
    params: CreateTokenTransaction,
) -> Result<TokenTransaction, sqlx::Error> {
    sqlx::query_as::<_, TokenTransaction>(&format!(
        "INSERT INTO token_transactions (id, user_id, amount, kind, reason, metadata, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.amount)
    .bind(params.kind.as_str())
    .bind(params.reason)
    .bind(Json(params.metadata))
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn balance(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM token_transactions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_recent(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<TokenTransaction>, sqlx::Error> {
    sqlx::query_as::<_, TokenTransaction>(&format!(
        "SELECT {COLUMNS} FROM token_transactions
         WHERE user_id = $1
         ORDER BY created_at DESC, id
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit.clamp(1, 500))
    .fetch_all(pool)
    .await
}
