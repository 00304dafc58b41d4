use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

pub(crate) const COLUMNS: &str = "\
    id, assignment_id, student_id, content, attachments, is_late, status, submitted_at, \
    created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct DraftSubmission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) content: String,
    pub(crate) attachments: Vec<String>,
    pub(crate) is_late: bool,
    pub(crate) now: PrimitiveDateTime,
}

/// Fields stamped while moving a submission between states; `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransitionStamp {
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) is_late: Option<bool>,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_for_student(
    pool: &PgPool,
    assignment_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE assignment_id = $1 AND student_id = $2"
    ))
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE assignment_id = $1 ORDER BY created_at"
    ))
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

/// Inserts the draft or overwrites the existing one for the same
/// (assignment, student) pair. The unique constraint makes this atomic; a
/// row that already left `draft` is not touched and `None` is returned.
pub(crate) async fn upsert_draft(
    pool: &PgPool,
    params: DraftSubmission,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions (
            id, assignment_id, student_id, content, attachments, is_late, status,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
         ON CONFLICT (assignment_id, student_id) DO UPDATE
         SET content = EXCLUDED.content,
             attachments = EXCLUDED.attachments,
             is_late = EXCLUDED.is_late,
             updated_at = EXCLUDED.updated_at
         WHERE submissions.status = $7
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.assignment_id)
    .bind(params.student_id)
    .bind(params.content)
    .bind(Json(params.attachments))
    .bind(params.is_late)
    .bind(SubmissionStatus::Draft)
    .bind(params.now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn transition(
    pool: &PgPool,
    id: &str,
    from: SubmissionStatus,
    to: SubmissionStatus,
    stamp: TransitionStamp,
    now: PrimitiveDateTime,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "UPDATE submissions
         SET status = $1,
             submitted_at = COALESCE($2, submitted_at),
             is_late = COALESCE($3, is_late),
             updated_at = $4
         WHERE id = $5 AND status = $6
         RETURNING {COLUMNS}"
    ))
    .bind(to)
    .bind(stamp.submitted_at)
    .bind(stamp.is_late)
    .bind(now)
    .bind(id)
    .bind(from)
    .fetch_optional(pool)
    .await
}
