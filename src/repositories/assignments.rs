use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Assignment;
use crate::db::types::AssignmentStatus;

const COLUMNS: &str = "\
    id, course_id, title, description, due_date, max_points, allow_late_submission, \
    late_penalty_rate, status, created_by, published_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct CreateAssignment {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) due_date: PrimitiveDateTime,
    pub(crate) max_points: f64,
    pub(crate) allow_late_submission: bool,
    pub(crate) late_penalty_rate: f64,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAssignment,
) -> Result<Assignment, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "INSERT INTO assignments (
            id, course_id, title, description, due_date, max_points, allow_late_submission,
            late_penalty_rate, status, created_by, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$11)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.course_id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.due_date)
    .bind(params.max_points)
    .bind(params.allow_late_submission)
    .bind(params.late_penalty_rate)
    .bind(AssignmentStatus::Draft)
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("SELECT {COLUMNS} FROM assignments WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_for_course(
    pool: &PgPool,
    course_id: &str,
    statuses: &[AssignmentStatus],
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {COLUMNS}
         FROM assignments
         WHERE course_id = $1 AND status = ANY($2)
         ORDER BY due_date, created_at"
    ))
    .bind(course_id)
    .bind(statuses)
    .fetch_all(pool)
    .await
}

/// Compare-and-set on the status column. Returns `None` when the row is not
/// in `from` anymore.
pub(crate) async fn transition(
    pool: &PgPool,
    id: &str,
    from: AssignmentStatus,
    to: AssignmentStatus,
    now: PrimitiveDateTime,
) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "UPDATE assignments
         SET status = $1,
             published_at = CASE WHEN $1 = 'published'::assignmentstatus THEN $2 ELSE published_at END,
             updated_at = $2
         WHERE id = $3 AND status = $4
         RETURNING {COLUMNS}"
    ))
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .fetch_optional(pool)
    .await
}
