//! crates/insight_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database and of the outbound worker APIs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Summary, SummaryRequest, Topic, TopicPreference, User, UserCredentials, UserPreference,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and core operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Summarization worker unavailable: {0}")]
    DispatchFailure(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Topics ---
    async fn find_topic_by_title(&self, title: &str) -> PortResult<Option<Topic>>;

    async fn get_topic_by_id(&self, topic_id: i64) -> PortResult<Topic>;

    /// Creates the topic and puts it on the owner's topic list.
    async fn create_topic(&self, title: &str, owner_id: Uuid) -> PortResult<Topic>;

    /// Adds the topic to the user's list. Linking twice is a no-op.
    async fn link_user_topic(&self, user_id: Uuid, topic_id: i64) -> PortResult<()>;

    async fn list_topics_for_user(&self, user_id: Uuid) -> PortResult<Vec<Topic>>;

    // --- Summaries ---
    async fn save_summary(
        &self,
        topic_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        content: &str,
    ) -> PortResult<Summary>;

    async fn get_summary_by_id(&self, summary_id: i64) -> PortResult<Summary>;

    // --- Preferences ---
    async fn get_or_create_user_preference(&self, user_id: Uuid) -> PortResult<UserPreference>;

    async fn set_send_notification_when_ready(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> PortResult<UserPreference>;

    async fn find_topic_preference(
        &self,
        user_id: Uuid,
        topic_id: i64,
    ) -> PortResult<Option<TopicPreference>>;

    /// Returns the existing preference for the pair, creating it first if needed.
    async fn get_or_create_topic_preference(
        &self,
        user_id: Uuid,
        topic_id: i64,
    ) -> PortResult<TopicPreference>;

    async fn set_send_newsletter(
        &self,
        preference_id: i64,
        enabled: bool,
    ) -> PortResult<TopicPreference>;

    async fn list_topic_preferences(&self, user_id: Uuid) -> PortResult<Vec<TopicPreference>>;
}

#[async_trait]
pub trait SummarizationService: Send + Sync {
    /// Hands the request to the external worker. Returns once the worker has
    /// accepted it; the summary itself arrives later through the callback.
    async fn request_summary(&self, request: &SummaryRequest) -> PortResult<()>;
}

#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Sends a plain text message to the user through the messaging worker.
    async fn send_message(&self, user_id: Uuid, text: &str) -> PortResult<()>;
}
