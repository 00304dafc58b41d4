use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod assignment;
pub(crate) mod auth;
pub(crate) mod course;
pub(crate) mod notification;
pub(crate) mod submission;
pub(crate) mod user;

mod datetime;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) docs_url: String,
}

/// Success envelope shared by every workflow endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) data: T,
}

impl<T> ApiResponse<T> {
    pub(crate) fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data }
    }
}
