//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the user-facing REST API and the master
//! definition for the OpenAPI specification.

use crate::error::port_error_response;
use crate::web::auth::{self, AuthResponse, Credentials};
use crate::web::callback::{self, CallbackAck, SummaryCallback};
use crate::web::state::{AppState, AuthenticatedUser};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use insight_core::{
    resolve_period, EnqueueOutcome, PortError, PreferenceKind, PreferenceUpdate, PreferenceView,
    Summary, SummaryOverview, Topic, TopicPreference, UserOverview, UserPreference,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        user_overview_handler,
        list_summaries_handler,
        get_summary_handler,
        attach_topic_handler,
        summarize_handler,
        set_preference_handler,
        callback::summary_callback_handler,
    ),
    components(
        schemas(
            Credentials,
            AuthResponse,
            TopicRequest,
            TopicResponse,
            SummaryResponse,
            SummaryOverviewResponse,
            UserPreferenceResponse,
            TopicPreferenceResponse,
            PreferenceResponse,
            UserOverviewResponse,
            SummarizeRequest,
            TopicIdParam,
            MessageResponse,
            SummaryCallback,
            CallbackAck,
        )
    ),
    tags(
        (name = "Insight API", description = "Topics, summaries and notification preferences.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct TopicRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    pub id: i64,
    pub topic_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Summary> for SummaryResponse {
    fn from(s: Summary) -> Self {
        Self {
            id: s.id,
            topic_id: s.topic_id,
            start_date: s.start_date,
            end_date: s.end_date,
            content: s.content,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopicResponse {
    pub id: i64,
    pub title: String,
    pub owner_id: Uuid,
    pub summaries: Vec<SummaryResponse>,
}

impl From<Topic> for TopicResponse {
    fn from(t: Topic) -> Self {
        Self {
            id: t.id,
            title: t.title,
            owner_id: t.owner_id,
            summaries: t.summaries.into_iter().map(Into::into).collect(),
        }
    }
}

/// A summary listed without its content.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryOverviewResponse {
    pub id: i64,
    pub topic_id: i64,
    pub topic_title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<SummaryOverview> for SummaryOverviewResponse {
    fn from(s: SummaryOverview) -> Self {
        Self {
            id: s.id,
            topic_id: s.topic_id,
            topic_title: s.topic_title,
            start_date: s.start_date,
            end_date: s.end_date,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserPreferenceResponse {
    pub user_id: Uuid,
    pub send_notification_when_ready: bool,
}

impl From<UserPreference> for UserPreferenceResponse {
    fn from(p: UserPreference) -> Self {
        Self {
            user_id: p.user_id,
            send_notification_when_ready: p.send_notification_when_ready,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopicPreferenceResponse {
    pub id: i64,
    pub user_id: Uuid,
    pub topic_id: i64,
    pub send_newsletter: bool,
}

impl From<TopicPreference> for TopicPreferenceResponse {
    fn from(p: TopicPreference) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            topic_id: p.topic_id,
            send_newsletter: p.send_newsletter,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PreferenceResponse {
    Topic(TopicPreferenceResponse),
    User(UserPreferenceResponse),
}

impl From<PreferenceView> for PreferenceResponse {
    fn from(view: PreferenceView) -> Self {
        match view {
            PreferenceView::User(p) => PreferenceResponse::User(p.into()),
            PreferenceView::Topic(p) => PreferenceResponse::Topic(p.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserOverviewResponse {
    pub topics: Vec<TopicResponse>,
    pub user_preference: UserPreferenceResponse,
    pub topic_preferences: Vec<TopicPreferenceResponse>,
}

impl From<UserOverview> for UserOverviewResponse {
    fn from(o: UserOverview) -> Self {
        Self {
            topics: o.topics.into_iter().map(Into::into).collect(),
            user_preference: o.user_preference.into(),
            topic_preferences: o.topic_preferences.into_iter().map(Into::into).collect(),
        }
    }
}

/// Topic ids are accepted both as JSON numbers and as numeric strings.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TopicIdParam {
    Number(i64),
    Text(String),
}

impl TopicIdParam {
    fn parse(&self) -> Option<i64> {
        match self {
            TopicIdParam::Number(id) => Some(*id),
            TopicIdParam::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SummarizeRequest {
    pub topic_id: TopicIdParam,
    /// `day`, `week` or `month`.
    pub period: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreferenceQuery {
    /// Required for the `TOPIC` type.
    pub topic_id: Option<i64>,
    pub send_newsletter: Option<bool>,
    pub send_when_ready: Option<bool>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the user's topics and preferences.
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Topics and preferences of the user", body = UserOverviewResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn user_overview_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> Result<Json<UserOverviewResponse>, (StatusCode, String)> {
    let overview = state
        .preferences
        .overview(user_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(overview.into()))
}

/// List the summaries available across the user's topics.
#[utoipa::path(
    get,
    path = "/summaries",
    responses(
        (status = 200, description = "Summaries of the user's topics", body = Vec<SummaryOverviewResponse>),
        (status = 404, description = "The user has no summaries yet")
    )
)]
pub async fn list_summaries_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<SummaryOverviewResponse>>, (StatusCode, String)> {
    let summaries = state
        .preferences
        .summaries_for(user_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Summary list not found".to_string()),
            other => port_error_response(other),
        })?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// Read one summary of one of the user's topics.
#[utoipa::path(
    get,
    path = "/summary/{id}",
    params(("id" = i64, Path, description = "Summary id")),
    responses(
        (status = 200, description = "The summary", body = SummaryResponse),
        (status = 403, description = "The summary belongs to a topic the user does not follow"),
        (status = 404, description = "No such summary")
    )
)]
pub async fn get_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(summary_id): Path<i64>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    let summary = state
        .preferences
        .summary_for(user_id, summary_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(summary.into()))
}

/// Attach a topic to the user, creating it if needed.
///
/// A summary of the last day is requested for the topic right away.
#[utoipa::path(
    post,
    path = "/topic",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "The attached topic", body = TopicResponse),
        (status = 400, description = "Blank title")
    )
)]
pub async fn attach_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(req): Json<TopicRequest>,
) -> Result<Json<TopicResponse>, (StatusCode, String)> {
    let topic = state
        .preferences
        .attach_topic(user_id, &req.title)
        .await
        .map_err(port_error_response)?;
    Ok(Json(topic.into()))
}

/// Ask for a summary of a topic over a period.
#[utoipa::path(
    post,
    path = "/summarize",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Request dispatched", body = MessageResponse),
        (status = 202, description = "The same request is already being processed", body = MessageResponse),
        (status = 400, description = "Invalid period or topic id"),
        (status = 502, description = "Summarization worker unreachable"),
        (status = 503, description = "Topic could not be resolved")
    )
)]
pub async fn summarize_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(req): Json<SummarizeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic_id = req
        .topic_id
        .parse()
        .ok_or((StatusCode::BAD_REQUEST, "Invalid topic id".to_string()))?;

    let topic = match state.db.get_topic_by_id(topic_id).await {
        Ok(topic) => topic,
        Err(PortError::NotFound(_)) => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable.".to_string(),
            ))
        }
        Err(e) => return Err(port_error_response(e)),
    };

    let request = resolve_period(&req.period, &topic.title)
        .ok_or_else(|| port_error_response(PortError::InvalidPeriod(req.period.clone())))?;

    match state
        .summary_queue
        .enqueue(request, user_id)
        .await
        .map_err(port_error_response)?
    {
        EnqueueOutcome::Queued => Ok((StatusCode::OK, MessageResponse::new("Request accepted."))),
        EnqueueOutcome::AlreadyQueued => {
            info!("Duplicate summary request from user {} for topic {}.", user_id, topic.id);
            Ok((
                StatusCode::ACCEPTED,
                MessageResponse::new(
                    "This request is already being processed; its result will be available as soon as possible.",
                ),
            ))
        }
    }
}

/// Set the user's notification preference or the newsletter flag of one topic.
#[utoipa::path(
    post,
    path = "/preference/{preference_type}",
    params(
        ("preference_type" = String, Path, description = "USER or TOPIC"),
        PreferenceQuery
    ),
    responses(
        (status = 200, description = "The updated preference", body = PreferenceResponse),
        (status = 400, description = "Unknown preference type"),
        (status = 404, description = "Topic or topic preference not found")
    )
)]
pub async fn set_preference_handler(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(preference_type): Path<String>,
    Query(query): Query<PreferenceQuery>,
) -> Result<Json<PreferenceResponse>, (StatusCode, String)> {
    let kind = preference_type
        .parse::<PreferenceKind>()
        .map_err(port_error_response)?;
    let update = PreferenceUpdate::new(
        kind,
        query.topic_id,
        query.send_newsletter.unwrap_or(false),
        query.send_when_ready.unwrap_or(false),
    );

    let view = state
        .preferences
        .set_preference(user_id, update)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::NOT_FOUND, "Topic not found".to_string()),
            other => port_error_response(other),
        })?;
    Ok(Json(view.into()))
}
