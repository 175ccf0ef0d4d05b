//! services/api/src/web/callback.rs
//!
//! The webhook through which the summarization worker reports a finished
//! (or abandoned) request.

use crate::error::port_error_response;
use crate::web::rest::SummaryResponse;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use insight_core::SummaryRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// The worker's report. `content` present means completed; absent means failed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryCallback {
    pub topic_title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content: Option<String>,
    pub error: Option<String>,
}

/// Answer to a failure report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackAck {
    /// Whether a pending request was cleared.
    pub released: bool,
}

/// Receive the outcome of a summarization request.
#[utoipa::path(
    post,
    path = "/summaries/callback",
    request_body = SummaryCallback,
    params(
        ("x-callback-token" = Option<String>, Header, description = "Shared secret, when configured.")
    ),
    responses(
        (status = 200, description = "Summary stored, or failure acknowledged"),
        (status = 401, description = "Missing or wrong callback token"),
        (status = 404, description = "No such pending request, or the topic no longer exists")
    )
)]
pub async fn summary_callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(callback): Json<SummaryCallback>,
) -> Result<Response, (StatusCode, String)> {
    if let Some(expected) = state.config.callback_token.as_deref() {
        let provided = headers
            .get(CALLBACK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Rejected summary callback with a bad token.");
            return Err((StatusCode::UNAUTHORIZED, "Invalid callback token".to_string()));
        }
    }

    let request = SummaryRequest::new(callback.topic_title, callback.start_date, callback.end_date);

    match callback.content {
        Some(content) => {
            let summary = state
                .summary_queue
                .complete(request, &content)
                .await
                .map_err(port_error_response)?;
            Ok(Json(SummaryResponse::from(summary)).into_response())
        }
        None => {
            let reason = callback
                .error
                .unwrap_or_else(|| "no reason given".to_string());
            let released = state.summary_queue.fail(&request, &reason).await.is_some();
            Ok(Json(CallbackAck { released }).into_response())
        }
    }
}
