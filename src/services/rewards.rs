use serde_json::json;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::TokenTransaction;
use crate::db::types::TokenKind;
use crate::repositories::token_transactions::CreateTokenTransaction;
use crate::repositories::Store;
use crate::services::best_effort;

/// (minimum percentage, tokens), highest tier first.
const BONUS_TIERS: [(f64, i32); 4] = [(90.0, 50), (80.0, 30), (70.0, 20), (60.0, 10)];

/// Tiered bonus for `value` out of `max_points`. Compared as
/// `value * 100 >= pct * max_points` so integer boundaries are exact.
pub(crate) fn bonus_tokens(value: f64, max_points: f64) -> i32 {
    if !(max_points > 0.0) || !value.is_finite() {
        return 0;
    }

    let scaled = value * 100.0;
    BONUS_TIERS
        .iter()
        .find(|(pct, _)| scaled >= pct * max_points)
        .map_or(0, |(_, tokens)| *tokens)
}

/// Late work keeps `value * (100 - rate) / 100`; on-time work keeps `value`.
pub(crate) fn apply_late_penalty(value: f64, is_late: bool, late_penalty_rate: f64) -> f64 {
    if !is_late {
        return value;
    }
    let rate = late_penalty_rate.clamp(0.0, 100.0);
    value * (100.0 - rate) / 100.0
}

pub(crate) struct Reward<'a> {
    pub(crate) user_id: &'a str,
    pub(crate) amount: i32,
    pub(crate) kind: TokenKind,
    pub(crate) reason: String,
    pub(crate) reference_id: &'a str,
}

/// Records a reward transaction. Failures are logged and yield `None`; a
/// non-positive amount records nothing.
pub(crate) async fn award(
    store: &dyn Store,
    reward: Reward<'_>,
    now: PrimitiveDateTime,
) -> Option<TokenTransaction> {
    if reward.amount <= 0 {
        return None;
    }

    let transaction = best_effort::attempt(
        "token_reward",
        store.insert_token_transaction(CreateTokenTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: reward.user_id.to_string(),
            amount: reward.amount,
            kind: reward.kind,
            reason: reward.reason,
            metadata: json!({ "reference_id": reward.reference_id }),
            created_at: now,
        }),
    )
    .await?;

    tracing::info!(
        user_id = %transaction.user_id,
        amount = transaction.amount,
        kind = %transaction.kind,
        "Tokens awarded"
    );
    Some(transaction)
}
