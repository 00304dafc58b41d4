use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::submission::{
    FinalizeResponse, GradeResponse, SubmissionResponse, SubmissionUpsert,
};
use crate::schemas::ApiResponse;
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::submissions;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(save_submission))
        .route("/:submission_id", get(get_submission))
        .route("/:submission_id/submit", post(submit_submission))
        .route("/:submission_id/return", post(return_submission))
        .route("/:submission_id/grade", get(get_grade))
}

async fn save_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SubmissionUpsert>,
) -> Result<Json<ApiResponse<SubmissionResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let student_id = payload.student_id.unwrap_or_else(|| user.id.clone());
    let submission = submissions::create_or_update(
        &state,
        &user,
        submissions::SubmissionInput {
            assignment_id: payload.assignment_id,
            student_id,
            content: payload.content,
            attachments: payload.attachments,
        },
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(ApiResponse::ok("Submission saved", SubmissionResponse::from_db(submission))))
}

async fn get_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<SubmissionResponse>>, ApiError> {
    let (submission, _) = submissions::visible_submission(&state, &user, &submission_id).await?;
    Ok(Json(ApiResponse::ok("Submission", SubmissionResponse::from_db(submission))))
}

async fn submit_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<FinalizeResponse>>, ApiError> {
    let finalized =
        submissions::finalize(&state, &user, &submission_id, primitive_now_utc()).await?;

    let response = FinalizeResponse {
        tokens_awarded: finalized.reward.as_ref().map_or(0, |reward| reward.amount),
        submission: SubmissionResponse::from_db(finalized.submission),
    };
    Ok(Json(ApiResponse::ok("Submission submitted", response)))
}

async fn return_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<SubmissionResponse>>, ApiError> {
    let returned =
        submissions::return_submission(&state, &user, &submission_id, primitive_now_utc()).await?;
    Ok(Json(ApiResponse::ok(
        "Submission returned",
        SubmissionResponse::from_db(returned.submission),
    )))
}

async fn get_grade(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<GradeResponse>>, ApiError> {
    let (submission, _) = submissions::visible_submission(&state, &user, &submission_id).await?;
    let grade = state
        .store()
        .find_grade(&submission.id)
        .await
        .persistence("Failed to load grade")?
        .ok_or_else(|| WorkflowError::not_found("Submission has not been graded"))?;

    Ok(Json(ApiResponse::ok("Grade", GradeResponse::from_db(grade))))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use time::Duration;
    use tower::ServiceExt;

    use crate::db::types::{SubmissionStatus, UserRole};
    use crate::test_support::{bearer_token, json_request, read_json, seed_user, TestWorld};

    #[tokio::test]
    async fn save_twice_then_submit_keeps_one_row() {
        let world = TestWorld::new();
        let classroom = world.classroom(Duration::days(2), false).await;
        let token = bearer_token(&classroom.student, world.state.settings());

        let mut submission_id = String::new();
        for content in ["first draft", "second draft"] {
            let response = world
                .app()
                .oneshot(json_request(
                    Method::POST,
                    "/api/v1/submissions",
                    Some(&token),
                    Some(json!({
                        "assignment_id": classroom.assignment.id,
                        "content": content,
                        "attachments": ["essay.pdf"]
                    })),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = read_json(response).await;
            assert_eq!(body["data"]["content"], content);
            submission_id = body["data"]["id"].as_str().unwrap().to_string();
        }
        assert_eq!(world.store.submissions().len(), 1);

        let submitted = world
            .app()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/submissions/{submission_id}/submit"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(submitted.status(), StatusCode::OK);
        let body = read_json(submitted).await;
        assert_eq!(body["data"]["submission"]["status"], "submitted");
        assert_eq!(
            body["data"]["tokens_awarded"],
            world.state.settings().rewards().submission_reward_tokens
        );
        assert_eq!(world.store.submissions()[0].status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn late_save_is_rejected_when_not_allowed() {
        let world = TestWorld::new();
        let classroom = world.classroom(Duration::hours(-1), false).await;
        let token = bearer_token(&classroom.student, world.state.settings());

        let response = world
            .app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(&token),
                Some(json!({"assignment_id": classroom.assignment.id, "content": "late"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "validation_error");
        assert!(world.store.submissions().is_empty());
    }

    #[tokio::test]
    async fn other_students_cannot_read_a_submission() {
        let world = TestWorld::new();
        let classroom = world.classroom(Duration::days(2), false).await;
        let other = seed_user(&world.store, "other@classhub.test", UserRole::Student).await;

        let saved = world
            .app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(&bearer_token(&classroom.student, world.state.settings())),
                Some(json!({"assignment_id": classroom.assignment.id, "content": "mine"})),
            ))
            .await
            .unwrap();
        let submission_id = read_json(saved).await["data"]["id"].as_str().unwrap().to_string();

        let response = world
            .app()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/submissions/{submission_id}"),
                Some(&bearer_token(&other, world.state.settings())),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let teacher_view = world
            .app()
            .oneshot(json_request(
                Method::GET,
                &format!("/api/v1/submissions/{submission_id}/grade"),
                Some(&bearer_token(&classroom.teacher, world.state.settings())),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(teacher_view.status(), StatusCode::NOT_FOUND);
    }
}
