use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::user::{TokenBalanceResponse, TokenTransactionResponse};
use crate::schemas::ApiResponse;
use crate::services::errors::StoreResultExt;

const RECENT_TRANSACTIONS: i64 = 50;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/me/tokens", get(my_tokens))
}

async fn my_tokens(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<TokenBalanceResponse>>, ApiError> {
    let balance =
        state.store().token_balance(&user.id).await.persistence("Failed to load token balance")?;
    let transactions = state
        .store()
        .list_token_transactions(&user.id, RECENT_TRANSACTIONS)
        .await
        .persistence("Failed to load token transactions")?
        .into_iter()
        .map(TokenTransactionResponse::from_db)
        .collect();

    Ok(Json(ApiResponse::ok("Token balance", TokenBalanceResponse { balance, transactions })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::core::time::primitive_now_utc;
    use crate::db::types::{TokenKind, UserRole};
    use crate::services::rewards::{self, Reward};
    use crate::test_support::{bearer_token, json_request, read_json, seed_user, TestWorld};

    #[tokio::test]
    async fn tokens_endpoint_reports_balance_and_history() {
        let world = TestWorld::new();
        let student = seed_user(&world.store, "s@classhub.test", UserRole::Student).await;
        for amount in [10, 30] {
            let reward = Reward {
                user_id: &student.id,
                amount,
                kind: TokenKind::GradeBonus,
                reason: "test reward".to_string(),
                reference_id: "submission-1",
            };
            rewards::award(world.state.store(), reward, primitive_now_utc()).await.unwrap();
        }

        let response = world
            .app()
            .oneshot(json_request(
                Method::GET,
                "/api/v1/users/me/tokens",
                Some(&bearer_token(&student, world.state.settings())),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["balance"], 40);
        assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["transactions"][0]["type"], "grade_bonus");
    }
}
