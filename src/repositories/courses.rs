use sqlx::PgPool;

use crate::db::models::Course;

const COURSE_COLUMNS: &str =
    "id, code, title, description, teacher_id, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct CreateCourse {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateCourse) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (
            id, code, title, description, teacher_id, is_active, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,TRUE,$6,$6)
         RETURNING {COURSE_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.code)
    .bind(params.title)
    .bind(params.description)
    .bind(params.teacher_id)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    course_id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(course_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_code(
    pool: &PgPool,
    code: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE code = $1"))
        .bind(code)
        .fetch_optional(pool)
        .await
}
