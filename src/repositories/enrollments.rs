use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{Enrollment, User};
use crate::db::types::EnrollmentStatus;

const COLUMNS: &str = "id, course_id, student_id, status, enrolled_at, updated_at";

/// Inserts the enrollment or moves an existing one to `status`.
pub(crate) async fn upsert(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
    status: EnrollmentStatus,
    now: PrimitiveDateTime,
) -> Result<Enrollment, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "INSERT INTO enrollments (id, course_id, student_id, status, enrolled_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         ON CONFLICT (course_id, student_id) DO UPDATE
         SET status = EXCLUDED.status,
             updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(course_id)
    .bind(student_id)
    .bind(status)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM enrollments WHERE course_id = $1 AND student_id = $2"
    ))
    .bind(course_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_active_students(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT u.id, u.email, u.hashed_password, u.full_name, u.role, u.is_active,
                u.created_at, u.updated_at
         FROM enrollments e
         JOIN users u ON u.id = e.student_id
         WHERE e.course_id = $1
           AND e.status = $2
           AND u.is_active = TRUE
         ORDER BY e.enrolled_at",
    )
    .bind(course_id)
    .bind(EnrollmentStatus::Active)
    .fetch_all(pool)
    .await
}
