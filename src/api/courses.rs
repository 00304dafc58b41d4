use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::assignment::AssignmentResponse;
use crate::schemas::course::{CourseCreate, CourseResponse, EnrollmentCreate, EnrollmentResponse};
use crate::schemas::ApiResponse;
use crate::services::{assignments, courses};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_course))
        .route("/:course_id", get(get_course))
        .route("/:course_id/assignments", get(list_assignments))
        .route("/:course_id/enrollments", post(enroll))
        .route("/:course_id/enrollments/:student_id", delete(drop_enrollment))
}

async fn create_course(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<ApiResponse<CourseResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let course = courses::create_course(
        &state,
        &user,
        courses::NewCourse {
            code: payload.code,
            title: payload.title,
            description: payload.description,
            teacher_id: payload.teacher_id,
        },
        primitive_now_utc(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Course created", CourseResponse::from_db(course))),
    ))
}

async fn get_course(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<ApiResponse<CourseResponse>>, ApiError> {
    let course = courses::load_course(&state, &course_id).await?;
    Ok(Json(ApiResponse::ok("Course", CourseResponse::from_db(course))))
}

async fn list_assignments(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<AssignmentResponse>>>, ApiError> {
    let items = assignments::list_for_course(&state, &user, &course_id)
        .await?
        .into_iter()
        .map(AssignmentResponse::from_db)
        .collect();
    Ok(Json(ApiResponse::ok("Assignments", items)))
}

async fn enroll(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<EnrollmentCreate>,
) -> Result<(StatusCode, Json<ApiResponse<EnrollmentResponse>>), ApiError> {
    let student_id = payload.student_id.unwrap_or_else(|| user.id.clone());
    let change =
        courses::enroll(&state, &user, &course_id, &student_id, primitive_now_utc()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Student enrolled", EnrollmentResponse::from_db(change.enrollment))),
    ))
}

async fn drop_enrollment(
    Path((course_id, student_id)): Path<(String, String)>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<EnrollmentResponse>>, ApiError> {
    let change =
        courses::drop_enrollment(&state, &user, &course_id, &student_id, primitive_now_utc())
            .await?;

    Ok(Json(ApiResponse::ok("Enrollment dropped", EnrollmentResponse::from_db(change.enrollment))))
}
