use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::{TokenTransaction, User};
use crate::db::types::UserRole;

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            is_active: user.is_active,
            created_at: format_primitive(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenTransactionResponse {
    pub(crate) id: String,
    pub(crate) amount: i32,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) reason: String,
    pub(crate) metadata: serde_json::Value,
    pub(crate) created_at: String,
}

impl TokenTransactionResponse {
    pub(crate) fn from_db(transaction: TokenTransaction) -> Self {
        Self {
            id: transaction.id,
            amount: transaction.amount,
            kind: transaction.kind,
            reason: transaction.reason,
            metadata: transaction.metadata.0,
            created_at: format_primitive(transaction.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenBalanceResponse {
    pub(crate) balance: i64,
    pub(crate) transactions: Vec<TokenTransactionResponse>,
}
