//! crates/insight_core/src/testing.rs
//!
//! In-memory implementations of every port, for unit and router tests.
//! Compiled for this crate's tests and behind the `test-util` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Summary, SummaryRequest, Topic, TopicPreference, User, UserCredentials, UserPreference,
};
use crate::ports::{
    DatabaseService, MessagingService, PortError, PortResult, SummarizationService,
};

//=========================================================================================
// Database
//=========================================================================================

struct TopicRow {
    id: i64,
    title: String,
    owner_id: Uuid,
}

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    topics: Vec<TopicRow>,
    user_topics: Vec<(Uuid, i64)>,
    summaries: Vec<Summary>,
    user_preferences: HashMap<Uuid, UserPreference>,
    topic_preferences: Vec<TopicPreference>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn topic(&self, row: &TopicRow) -> Topic {
        Topic {
            id: row.id,
            title: row.title.clone(),
            owner_id: row.owner_id,
            summaries: self
                .summaries
                .iter()
                .filter(|s| s.topic_id == row.id)
                .cloned()
                .collect(),
        }
    }

    fn link(&mut self, user_id: Uuid, topic_id: i64) {
        if !self.user_topics.contains(&(user_id, topic_id)) {
            self.user_topics.push((user_id, topic_id));
        }
    }
}

/// A `DatabaseService` backed by plain collections behind a mutex.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    fail_summary_writes: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `save_summary` fail until switched off again.
    pub fn fail_summary_writes(&self, fail: bool) {
        self.fail_summary_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("Email {} already registered", email)));
        }
        let user_id = Uuid::new_v4();
        tables
            .user_preferences
            .insert(user_id, UserPreference::new(user_id));
        tables.users.push(UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables()
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables().auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables().auth_sessions.remove(session_id);
        Ok(())
    }

    async fn find_topic_by_title(&self, title: &str) -> PortResult<Option<Topic>> {
        let tables = self.tables();
        Ok(tables
            .topics
            .iter()
            .find(|t| t.title == title)
            .map(|row| tables.topic(row)))
    }

    async fn get_topic_by_id(&self, topic_id: i64) -> PortResult<Topic> {
        let tables = self.tables();
        tables
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .map(|row| tables.topic(row))
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))
    }

    async fn create_topic(&self, title: &str, owner_id: Uuid) -> PortResult<Topic> {
        let mut tables = self.tables();
        if tables.topics.iter().any(|t| t.title == title) {
            return Err(PortError::Unexpected(format!("Topic '{}' already exists", title)));
        }
        let id = tables.next_id();
        tables.topics.push(TopicRow {
            id,
            title: title.to_string(),
            owner_id,
        });
        tables.link(owner_id, id);
        Ok(Topic {
            id,
            title: title.to_string(),
            owner_id,
            summaries: Vec::new(),
        })
    }

    async fn link_user_topic(&self, user_id: Uuid, topic_id: i64) -> PortResult<()> {
        self.tables().link(user_id, topic_id);
        Ok(())
    }

    async fn list_topics_for_user(&self, user_id: Uuid) -> PortResult<Vec<Topic>> {
        let tables = self.tables();
        Ok(tables
            .user_topics
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, topic_id)| tables.topics.iter().find(|t| t.id == *topic_id))
            .map(|row| tables.topic(row))
            .collect())
    }

    async fn save_summary(
        &self,
        topic_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        content: &str,
    ) -> PortResult<Summary> {
        if self.fail_summary_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("summaries table unavailable".to_string()));
        }
        let mut tables = self.tables();
        let id = tables.next_id();
        let summary = Summary {
            id,
            topic_id,
            start_date,
            end_date,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        tables.summaries.push(summary.clone());
        Ok(summary)
    }

    async fn get_summary_by_id(&self, summary_id: i64) -> PortResult<Summary> {
        self.tables()
            .summaries
            .iter()
            .find(|s| s.id == summary_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Summary {} not found", summary_id)))
    }

    async fn get_or_create_user_preference(&self, user_id: Uuid) -> PortResult<UserPreference> {
        Ok(self
            .tables()
            .user_preferences
            .entry(user_id)
            .or_insert_with(|| UserPreference::new(user_id))
            .clone())
    }

    async fn set_send_notification_when_ready(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> PortResult<UserPreference> {
        let mut tables = self.tables();
        let preference = tables
            .user_preferences
            .entry(user_id)
            .or_insert_with(|| UserPreference::new(user_id));
        preference.send_notification_when_ready = enabled;
        Ok(preference.clone())
    }

    async fn find_topic_preference(
        &self,
        user_id: Uuid,
        topic_id: i64,
    ) -> PortResult<Option<TopicPreference>> {
        Ok(self
            .tables()
            .topic_preferences
            .iter()
            .find(|p| p.user_id == user_id && p.topic_id == topic_id)
            .cloned())
    }

    async fn get_or_create_topic_preference(
        &self,
        user_id: Uuid,
        topic_id: i64,
    ) -> PortResult<TopicPreference> {
        let mut tables = self.tables();
        if let Some(existing) = tables
            .topic_preferences
            .iter()
            .find(|p| p.user_id == user_id && p.topic_id == topic_id)
        {
            return Ok(existing.clone());
        }
        let preference = TopicPreference {
            id: tables.next_id(),
            user_id,
            topic_id,
            send_newsletter: false,
        };
        tables.topic_preferences.push(preference.clone());
        Ok(preference)
    }

    async fn set_send_newsletter(
        &self,
        preference_id: i64,
        enabled: bool,
    ) -> PortResult<TopicPreference> {
        let mut tables = self.tables();
        let preference = tables
            .topic_preferences
            .iter_mut()
            .find(|p| p.id == preference_id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Topic preference {} not found", preference_id))
            })?;
        preference.send_newsletter = enabled;
        Ok(preference.clone())
    }

    async fn list_topic_preferences(&self, user_id: Uuid) -> PortResult<Vec<TopicPreference>> {
        Ok(self
            .tables()
            .topic_preferences
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}

//=========================================================================================
// Outbound workers
//=========================================================================================

/// Records every request it accepts. Can be made slow or unreachable.
#[derive(Default)]
pub struct RecordingSummarizer {
    requests: Mutex<Vec<SummaryRequest>>,
    attempts: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl RecordingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn failing_after(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            fail: true,
            ..Self::default()
        }
    }

    /// Every dispatch, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SummaryRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SummarizationService for RecordingSummarizer {
    async fn request_summary(&self, request: &SummaryRequest) -> PortResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PortError::DispatchFailure("connection refused".to_string()));
        }
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        Ok(())
    }
}

/// Records every message it is asked to send.
#[derive(Default)]
pub struct RecordingMessenger {
    messages: Mutex<Vec<(Uuid, String)>>,
    fail: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(Uuid, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl MessagingService for RecordingMessenger {
    async fn send_message(&self, user_id: Uuid, text: &str) -> PortResult<()> {
        if self.fail {
            return Err(PortError::Unexpected("messaging worker down".to_string()));
        }
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((user_id, text.to_string()));
        Ok(())
    }
}
