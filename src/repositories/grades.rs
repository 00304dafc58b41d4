use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{Grade, Submission};
use crate::db::types::SubmissionStatus;

use super::submissions::COLUMNS as SUBMISSION_COLUMNS;

const COLUMNS: &str = "\
    id, submission_id, value, adjusted_value, comment, grader_id, graded_at, \
    created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct GradeWrite {
    pub(crate) submission_id: String,
    pub(crate) value: f64,
    pub(crate) adjusted_value: f64,
    pub(crate) comment: Option<String>,
    pub(crate) grader_id: String,
    pub(crate) now: PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedGrade {
    pub(crate) grade: Grade,
    pub(crate) submission: Submission,
    /// `false` when an existing grade row was corrected.
    pub(crate) created: bool,
}

pub(crate) async fn find_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<Grade>, sqlx::Error> {
    sqlx::query_as::<_, Grade>(&format!("SELECT {COLUMNS} FROM grades WHERE submission_id = $1"))
        .bind(submission_id)
        .fetch_optional(pool)
        .await
}

/// Creates or corrects the single grade row of a submission and marks the
/// submission `graded`, all in one transaction. Returns `None` (and writes
/// nothing) when the submission is missing or neither `submitted` nor
/// `graded`.
pub(crate) async fn record(
    pool: &PgPool,
    params: GradeWrite,
) -> Result<Option<RecordedGrade>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let status = sqlx::query_scalar::<_, SubmissionStatus>(
        "SELECT status FROM submissions WHERE id = $1 FOR UPDATE",
    )
    .bind(&params.submission_id)
    .fetch_optional(&mut *tx)
    .await?;

    if !matches!(status, Some(SubmissionStatus::Submitted | SubmissionStatus::Graded)) {
        tx.rollback().await?;
        return Ok(None);
    }

    let existing_id =
        sqlx::query_scalar::<_, String>("SELECT id FROM grades WHERE submission_id = $1")
            .bind(&params.submission_id)
            .fetch_optional(&mut *tx)
            .await?;

    let created = existing_id.is_none();
    let grade = match existing_id {
        Some(id) => {
            sqlx::query_as::<_, Grade>(&format!(
                "UPDATE grades
                 SET value = $1,
                     adjusted_value = $2,
                     comment = $3,
                     grader_id = $4,
                     graded_at = $5,
                     updated_at = $5
                 WHERE id = $6
                 RETURNING {COLUMNS}"
            ))
            .bind(params.value)
            .bind(params.adjusted_value)
            .bind(&params.comment)
            .bind(&params.grader_id)
            .bind(params.now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        }
        None => {
            sqlx::query_as::<_, Grade>(&format!(
                "INSERT INTO grades (
                    id, submission_id, value, adjusted_value, comment, grader_id,
                    graded_at, created_at, updated_at
                 ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7,$7)
                 RETURNING {COLUMNS}"
            ))
            .bind(Uuid::new_v4().to_string())
            .bind(&params.submission_id)
            .bind(params.value)
            .bind(params.adjusted_value)
            .bind(&params.comment)
            .bind(&params.grader_id)
            .bind(params.now)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    let submission = sqlx::query_as::<_, Submission>(&format!(
        "UPDATE submissions SET status = $1, updated_at = $2 WHERE id = $3
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(SubmissionStatus::Graded)
    .bind(params.now)
    .bind(&params.submission_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(RecordedGrade { grade, submission, created }))
}
