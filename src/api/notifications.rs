use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::pagination::{self, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::schemas::notification::{
    DispatchResponse, MarkedReadResponse, NotificationCreate, NotificationListParams,
    NotificationResponse, SystemNotificationCreate, UnreadCountResponse,
};
use crate::schemas::ApiResponse;
use crate::services::authorization;
use crate::services::errors::{StoreResultExt, WorkflowError};
use crate::services::notifications::{Dispatched, NotificationDraft, Recipients};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notifications))
        .route("/system", post(create_system_notification))
        .route("/unread-count", get(unread_count))
        .route("/read-all", patch(mark_all_read))
        .route("/:notification_id/read", patch(mark_read))
        .route("/:notification_id", delete(delete_notification))
}

async fn list_notifications(
    Query(params): Query<NotificationListParams>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<PaginatedResponse<NotificationResponse>>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);
    let (items, total_count) = state
        .store()
        .list_notifications(&user.id, params.unread_only, skip, limit)
        .await
        .persistence("Failed to list notifications")?;

    let response = PaginatedResponse {
        items: items.into_iter().map(NotificationResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    };
    Ok(Json(ApiResponse::ok("Notifications", response)))
}

async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, ApiError> {
    let unread_count = state
        .store()
        .count_unread_notifications(&user.id)
        .await
        .persistence("Failed to count notifications")?;
    Ok(Json(ApiResponse::ok("Unread notifications", UnreadCountResponse { unread_count })))
}

async fn mark_read(
    Path(notification_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<NotificationResponse>>, ApiError> {
    let notification = state
        .store()
        .mark_notification_read(&notification_id, &user.id, primitive_now_utc())
        .await
        .persistence("Failed to update notification")?
        .ok_or_else(|| WorkflowError::not_found("Notification not found"))?;

    Ok(Json(ApiResponse::ok(
        "Notification marked as read",
        NotificationResponse::from_db(notification),
    )))
}

async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<MarkedReadResponse>>, ApiError> {
    let updated = state
        .store()
        .mark_all_notifications_read(&user.id, primitive_now_utc())
        .await
        .persistence("Failed to update notifications")?;
    Ok(Json(ApiResponse::ok("All notifications marked as read", MarkedReadResponse { updated })))
}

async fn delete_notification(
    Path(notification_id): Path<String>,
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let deleted = state
        .store()
        .delete_notification(&notification_id, &user.id)
        .await
        .persistence("Failed to delete notification")?;
    if !deleted {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(ApiResponse::ok("Notification deleted", ())))
}

async fn create_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<NotificationCreate>,
) -> Result<(StatusCode, Json<ApiResponse<DispatchResponse>>), ApiError> {
    if !authorization::can_send_notifications(user.role) {
        return Err(ApiError::Forbidden("Only teachers and admins can send notifications".into()));
    }
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut draft = NotificationDraft::new(payload.kind, payload.title, payload.message)
        .priority(payload.priority);
    if let Some(metadata) = payload.metadata {
        draft = draft.metadata(metadata);
    }

    let dispatched = state
        .dispatcher()
        .dispatch(Recipients::Users(payload.user_ids), draft, primitive_now_utc())
        .await?;
    tracing::info!(
        sender_id = %user.id,
        count = dispatched.notifications.len(),
        action = "direct_notification",
        "Notifications created"
    );

    Ok((StatusCode::CREATED, Json(dispatch_response("Notifications created", dispatched))))
}

async fn create_system_notification(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<SystemNotificationCreate>,
) -> Result<(StatusCode, Json<ApiResponse<DispatchResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let draft = NotificationDraft::new(payload.kind, payload.title, payload.message)
        .priority(payload.priority);
    let dispatched = state
        .dispatcher()
        .dispatch(Recipients::Role(payload.role), draft, primitive_now_utc())
        .await?;
    tracing::info!(
        sender_id = %admin.id,
        role = ?payload.role,
        count = dispatched.notifications.len(),
        action = "system_notification",
        "System notification broadcast"
    );

    Ok((StatusCode::CREATED, Json(dispatch_response("System notification sent", dispatched))))
}

fn dispatch_response(message: &str, dispatched: Dispatched) -> ApiResponse<DispatchResponse> {
    let recipients =
        dispatched.notifications.iter().map(|notification| notification.user_id.clone()).collect();
    ApiResponse::ok(
        message,
        DispatchResponse { notifications_created: dispatched.notifications.len(), recipients },
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::models::User;
    use crate::db::types::UserRole;
    use crate::test_support::{bearer_token, json_request, read_json, seed_user, TestWorld};

    async fn wait_for_attempts(world: &TestWorld, expected: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while world.mailer.attempted().len() < expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("email batch finished");
    }

    async fn students(world: &TestWorld, count: usize) -> Vec<User> {
        let mut users = Vec::new();
        for index in 0..count {
            let email = format!("student{index}@classhub.test");
            users.push(seed_user(&world.store, &email, UserRole::Student).await);
        }
        users
    }

    #[tokio::test]
    async fn system_broadcast_survives_a_failing_email() {
        let world = TestWorld::new();
        let admin = seed_user(&world.store, "admin@classhub.test", UserRole::Admin).await;
        seed_user(&world.store, "teacher@classhub.test", UserRole::Teacher).await;
        let students = students(&world, 3).await;
        world.mailer.fail_for("student1@classhub.test");

        let response = world
            .app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/notifications/system",
                Some(&bearer_token(&admin, world.state.settings())),
                Some(json!({
                    "title": "Maintenance",
                    "message": "The platform restarts at 22:00 UTC.",
                    "role": "student",
                    "priority": "high"
                })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["notifications_created"], 3);
        assert_eq!(world.store.notification_count(), 3);

        wait_for_attempts(&world, 3).await;
        let delivered = world.mailer.delivered_to();
        assert_eq!(delivered.len(), 2);
        assert!(!delivered.contains(&students[1].email));
    }

    #[tokio::test]
    async fn system_broadcast_requires_admin() {
        let world = TestWorld::new();
        let teacher = seed_user(&world.store, "teacher@classhub.test", UserRole::Teacher).await;

        let response = world
            .app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/notifications/system",
                Some(&bearer_token(&teacher, world.state.settings())),
                Some(json!({"title": "Hi", "message": "Everyone"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(world.store.notification_count(), 0);
    }

    #[tokio::test]
    async fn direct_notification_rejects_unknown_recipients() {
        let world = TestWorld::new();
        let teacher = seed_user(&world.store, "teacher@classhub.test", UserRole::Teacher).await;
        let students = students(&world, 1).await;

        let response = world
            .app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/notifications",
                Some(&bearer_token(&teacher, world.state.settings())),
                Some(json!({
                    "user_ids": [students[0].id, "missing-user"],
                    "title": "Reminder",
                    "message": "Office hours moved"
                })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["error"], "not_found");
        assert_eq!(world.store.notification_count(), 0);
    }

    #[tokio::test]
    async fn students_cannot_send_direct_notifications() {
        let world = TestWorld::new();
        let students = students(&world, 2).await;

        let response = world
            .app()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/notifications",
                Some(&bearer_token(&students[0], world.state.settings())),
                Some(json!({"user_ids": [students[1].id], "title": "Hey", "message": "Psst"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn inbox_lists_marks_and_deletes() {
        let world = TestWorld::new();
        let teacher = seed_user(&world.store, "teacher@classhub.test", UserRole::Teacher).await;
        let students = students(&world, 1).await;
        let student_token = bearer_token(&students[0], world.state.settings());

        for title in ["First", "Second"] {
            let response = world
                .app()
                .oneshot(json_request(
                    Method::POST,
                    "/api/v1/notifications",
                    Some(&bearer_token(&teacher, world.state.settings())),
                    Some(json!({
                        "user_ids": [students[0].id],
                        "title": title,
                        "message": "Body",
                        "type": "warning"
                    })),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let listed = world
            .app()
            .oneshot(json_request(
                Method::GET,
                "/api/v1/notifications?unread_only=true&limit=10",
                Some(&student_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        let body = read_json(listed).await;
        assert_eq!(body["data"]["total_count"], 2);
        assert_eq!(body["data"]["items"][0]["type"], "warning");
        let first_id = body["data"]["items"][0]["id"].as_str().unwrap().to_string();

        let marked = world
            .app()
            .oneshot(json_request(
                Method::PATCH,
                &format!("/api/v1/notifications/{first_id}/read"),
                Some(&student_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(marked.status(), StatusCode::OK);
        assert_eq!(read_json(marked).await["data"]["is_read"], true);

        let count = world
            .app()
            .oneshot(json_request(
                Method::GET,
                "/api/v1/notifications/unread-count",
                Some(&student_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(read_json(count).await["data"]["unread_count"], 1);

        let teacher_delete = world
            .app()
            .oneshot(json_request(
                Method::DELETE,
                &format!("/api/v1/notifications/{first_id}"),
                Some(&bearer_token(&teacher, world.state.settings())),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(teacher_delete.status(), StatusCode::NOT_FOUND);

        let read_all = world
            .app()
            .oneshot(json_request(
                Method::PATCH,
                "/api/v1/notifications/read-all",
                Some(&student_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(read_json(read_all).await["data"]["updated"], 1);

        let deleted = world
            .app()
            .oneshot(json_request(
                Method::DELETE,
                &format!("/api/v1/notifications/{first_id}"),
                Some(&student_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        assert_eq!(world.store.notifications_for(&students[0].id).len(), 1);
    }
}
