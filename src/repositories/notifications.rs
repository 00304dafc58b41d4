use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Notification;
use crate::db::types::{NotificationKind, NotificationPriority};

const COLUMNS: &str =
    "id, user_id, title, message, kind, priority, is_read, read_at, metadata, created_at";

// 9 binds per row keeps one chunk well below the Postgres parameter limit.
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone)]
pub(crate) struct CreateNotification {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) kind: NotificationKind,
    pub(crate) priority: NotificationPriority,
    pub(crate) metadata: serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Inserts every row inside one transaction. Either all rows are written or
/// none are.
pub(crate) async fn insert_many(
    pool: &PgPool,
    rows: Vec<CreateNotification>,
) -> Result<Vec<Notification>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await?;
    let mut inserted = Vec::with_capacity(rows.len());

    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let chunk: Vec<CreateNotification> = rows.by_ref().take(INSERT_CHUNK).collect();

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO notifications (
                id, user_id, title, message, kind, priority, is_read, metadata, created_at
             ) ",
        );
        builder.push_values(chunk, |mut row, item| {
            row.push_bind(item.id)
                .push_bind(item.user_id)
                .push_bind(item.title)
                .push_bind(item.message)
                .push_bind(item.kind)
                .push_bind(item.priority)
                .push_bind(false)
                .push_bind(Json(item.metadata))
                .push_bind(item.created_at);
        });
        builder.push(format!(" RETURNING {COLUMNS}"));

        let mut batch = builder.build_query_as::<Notification>().fetch_all(&mut *tx).await?;
        inserted.append(&mut batch);
    }

    tx.commit().await?;
    Ok(inserted)
}

pub(crate) async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    unread_only: bool,
    skip: i64,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COLUMNS} FROM notifications WHERE user_id = "
    ));
    builder.push_bind(user_id);
    if unread_only {
        builder.push(" AND is_read = FALSE");
    }
    builder.push(" ORDER BY created_at DESC, id OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<Notification>().fetch_all(pool).await
}

pub(crate) async fn count_for_user(
    pool: &PgPool,
    user_id: &str,
    unread_only: bool,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications WHERE user_id = ");
    builder.push_bind(user_id);
    if unread_only {
        builder.push(" AND is_read = FALSE");
    }

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Marks one notification read. Only the recipient's own rows match.
pub(crate) async fn mark_read(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "UPDATE notifications
         SET is_read = TRUE,
             read_at = COALESCE(read_at, $1)
         WHERE id = $2 AND user_id = $3
         RETURNING {COLUMNS}"
    ))
    .bind(now)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn mark_all_read(
    pool: &PgPool,
    user_id: &str,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE, read_at = $1
         WHERE user_id = $2 AND is_read = FALSE",
    )
    .bind(now)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete(pool: &PgPool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
