use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::submission::{GradeCreate, GradeResponse, GradedResponse, SubmissionResponse};
use crate::schemas::ApiResponse;
use crate::services::grading;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(create_grade))
}

async fn create_grade(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<GradeCreate>,
) -> Result<(StatusCode, Json<ApiResponse<GradedResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let graded = grading::grade(
        &state,
        &user,
        grading::GradeInput {
            submission_id: payload.submission_id,
            value: payload.grade_value,
            comment: payload.comment,
        },
        primitive_now_utc(),
    )
    .await?;

    let (status, message) = if graded.created {
        (StatusCode::CREATED, "Grade recorded")
    } else {
        (StatusCode::OK, "Grade updated")
    };
    let response = GradedResponse {
        bonus_tokens: graded.bonus.as_ref().map_or(0, |bonus| bonus.amount),
        grade: GradeResponse::from_db(graded.grade),
        submission: SubmissionResponse::from_db(graded.submission),
    };

    Ok((status, Json(ApiResponse::ok(message, response))))
}
