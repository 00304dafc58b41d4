use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::schemas::assignment::{AssignmentCreate, AssignmentResponse};
use crate::schemas::submission::SubmissionResponse;
use crate::schemas::ApiResponse;
use crate::services::{assignments, submissions};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_assignment))
        .route("/:assignment_id", get(get_assignment))
        .route("/:assignment_id/publish", post(publish_assignment))
        .route("/:assignment_id/close", post(close_assignment))
        .route("/:assignment_id/submissions", get(list_submissions))
}

async fn create_assignment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<AssignmentCreate>,
) -> Result<(StatusCode, Json<ApiResponse<AssignmentResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let assignment = assignments::create_assignment(
        &state,
        &user,
        assignments::NewAssignment {
            course_id: payload.course_id,
            title: payload.title,
            description: payload.description,
            due_date: to_primitive_utc(payload.due_date),
            max_points: payload.max_points,
            allow_late_submission: payload.allow_late_submission,
            late_penalty_rate: payload.late_penalty_rate,
        },
        primitive_now_utc(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Assignment created", AssignmentResponse::from_db(assignment))),
    ))
}

async fn get_assignment(
    Path(assignment_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<AssignmentResponse>>, ApiError> {
    let assignment = assignments::visible_assignment(&state, &user, &assignment_id).await?;
    Ok(Json(ApiResponse::ok("Assignment", AssignmentResponse::from_db(assignment))))
}

async fn publish_assignment(
    Path(assignment_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<AssignmentResponse>>, ApiError> {
    let published =
        assignments::publish(&state, &user, &assignment_id, primitive_now_utc()).await?;
    let message = match &published.notified {
        Some(dispatched) => {
            format!("Assignment published, {} students notified", dispatched.notifications.len())
        }
        None => "Assignment published".to_string(),
    };

    Ok(Json(ApiResponse::ok(message, AssignmentResponse::from_db(published.assignment))))
}

async fn close_assignment(
    Path(assignment_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<AssignmentResponse>>, ApiError> {
    let assignment = assignments::close(&state, &user, &assignment_id, primitive_now_utc()).await?;
    Ok(Json(ApiResponse::ok("Assignment closed", AssignmentResponse::from_db(assignment))))
}

async fn list_submissions(
    Path(assignment_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<SubmissionResponse>>>, ApiError> {
    let items = submissions::list_for_assignment(&state, &user, &assignment_id)
        .await?
        .into_iter()
        .map(SubmissionResponse::from_db)
        .collect();
    Ok(Json(ApiResponse::ok("Submissions", items)))
}
