//! crates/insight_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// A subject a user follows. Titles are unique across the whole system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub owner_id: Uuid,
    /// Ordered oldest first. Owned by the topic; deleting it deletes these.
    pub summaries: Vec<Summary>,
}

impl Topic {
    pub fn contains_summary(&self, summary_id: i64) -> bool {
        self.summaries.iter().any(|s| s.id == summary_id)
    }
}

/// Summary content produced by the external worker for one date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub id: i64,
    pub topic_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One-to-one with a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreference {
    pub user_id: Uuid,
    pub send_notification_when_ready: bool,
}

impl UserPreference {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            send_notification_when_ready: false,
        }
    }
}

/// Belongs to a (user, topic) pair. Created the first time the user attaches the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPreference {
    pub id: i64,
    pub user_id: Uuid,
    pub topic_id: i64,
    pub send_newsletter: bool,
}

/// The descriptor of a summarization request.
///
/// Equality is structural: two requests for the same title and the same
/// date range are the same request, whatever period label produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryRequest {
    pub topic_title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl SummaryRequest {
    pub fn new(topic_title: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            topic_title: topic_title.into(),
            start_date,
            end_date,
        }
    }
}

/// The in-memory record marking a descriptor as in flight. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSummary {
    pub requester_id: Uuid,
    pub queued_at: DateTime<Utc>,
}
