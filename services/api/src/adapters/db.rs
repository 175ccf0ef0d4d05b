//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use insight_core::domain::{
    Summary, Topic, TopicPreference, User, UserCredentials, UserPreference,
};
use insight_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads the summaries of `topics` and assembles the domain topics.
    async fn with_summaries(&self, topics: Vec<TopicRecord>) -> PortResult<Vec<Topic>> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = topics.iter().map(|t| t.id).collect();
        let summaries = sqlx::query_as::<_, SummaryRecord>(
            "SELECT id, topic_id, start_date, end_date, content, created_at FROM summaries \
             WHERE topic_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut summaries: Vec<Summary> = summaries.into_iter().map(|r| r.to_domain()).collect();
        Ok(topics
            .into_iter()
            .map(|topic| {
                let (own, rest): (Vec<Summary>, Vec<Summary>) = summaries
                    .drain(..)
                    .partition(|s| s.topic_id == topic.id);
                summaries = rest;
                topic.to_domain(own)
            })
            .collect())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn conflict_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => PortError::Conflict(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: Some(self.email),
        }
    }

    fn to_credentials(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: i64,
    title: String,
    owner_id: Uuid,
}
impl TopicRecord {
    fn to_domain(self, summaries: Vec<Summary>) -> Topic {
        Topic {
            id: self.id,
            title: self.title,
            owner_id: self.owner_id,
            summaries,
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: i64,
    topic_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    content: String,
    created_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> Summary {
        Summary {
            id: self.id,
            topic_id: self.topic_id,
            start_date: self.start_date,
            end_date: self.end_date,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserPreferenceRecord {
    user_id: Uuid,
    send_notification_when_ready: bool,
}
impl UserPreferenceRecord {
    fn to_domain(self) -> UserPreference {
        UserPreference {
            user_id: self.user_id,
            send_notification_when_ready: self.send_notification_when_ready,
        }
    }
}

#[derive(FromRow)]
struct TopicPreferenceRecord {
    id: i64,
    user_id: Uuid,
    topic_id: i64,
    send_newsletter: bool,
}
impl TopicPreferenceRecord {
    fn to_domain(self) -> TopicPreference {
        TopicPreference {
            id: self.id,
            user_id: self.user_id,
            topic_id: self.topic_id,
            send_newsletter: self.send_newsletter,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_unexpected(e, format!("Email {} already registered", email)))?;

        sqlx::query("INSERT INTO user_preferences (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(record.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", email)))?;
        Ok(record.to_credentials())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn find_topic_by_title(&self, title: &str) -> PortResult<Option<Topic>> {
        let record = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, title, owner_id FROM topics WHERE title = $1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => Ok(self.with_summaries(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_topic_by_id(&self, topic_id: i64) -> PortResult<Topic> {
        let record = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, title, owner_id FROM topics WHERE id = $1",
        )
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Topic {} not found", topic_id)))?;

        self.with_summaries(vec![record])
            .await?
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))
    }

    async fn create_topic(&self, title: &str, owner_id: Uuid) -> PortResult<Topic> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, TopicRecord>(
            "INSERT INTO topics (title, owner_id) VALUES ($1, $2) RETURNING id, title, owner_id",
        )
        .bind(title)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query("INSERT INTO user_topics (user_id, topic_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(owner_id)
            .bind(record.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain(Vec::new()))
    }

    async fn link_user_topic(&self, user_id: Uuid, topic_id: i64) -> PortResult<()> {
        sqlx::query("INSERT INTO user_topics (user_id, topic_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(topic_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_topics_for_user(&self, user_id: Uuid) -> PortResult<Vec<Topic>> {
        let records = sqlx::query_as::<_, TopicRecord>(
            "SELECT t.id, t.title, t.owner_id FROM topics t \
             JOIN user_topics ut ON ut.topic_id = t.id \
             WHERE ut.user_id = $1 ORDER BY ut.linked_at ASC, t.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        self.with_summaries(records).await
    }

    async fn save_summary(
        &self,
        topic_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        content: &str,
    ) -> PortResult<Summary> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "INSERT INTO summaries (topic_id, start_date, end_date, content) VALUES ($1, $2, $3, $4) \
             RETURNING id, topic_id, start_date, end_date, content, created_at",
        )
        .bind(topic_id)
        .bind(start_date)
        .bind(end_date)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_summary_by_id(&self, summary_id: i64) -> PortResult<Summary> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "SELECT id, topic_id, start_date, end_date, content, created_at FROM summaries WHERE id = $1",
        )
        .bind(summary_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Summary {} not found", summary_id)))?;
        Ok(record.to_domain())
    }

    async fn get_or_create_user_preference(&self, user_id: Uuid) -> PortResult<UserPreference> {
        // The no-op update makes RETURNING yield the existing row too.
        let record = sqlx::query_as::<_, UserPreferenceRecord>(
            "INSERT INTO user_preferences (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING user_id, send_notification_when_ready",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn set_send_notification_when_ready(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> PortResult<UserPreference> {
        let record = sqlx::query_as::<_, UserPreferenceRecord>(
            "INSERT INTO user_preferences (user_id, send_notification_when_ready) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET send_notification_when_ready = EXCLUDED.send_notification_when_ready \
             RETURNING user_id, send_notification_when_ready",
        )
        .bind(user_id)
        .bind(enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn find_topic_preference(
        &self,
        user_id: Uuid,
        topic_id: i64,
    ) -> PortResult<Option<TopicPreference>> {
        let record = sqlx::query_as::<_, TopicPreferenceRecord>(
            "SELECT id, user_id, topic_id, send_newsletter FROM topic_preferences \
             WHERE user_id = $1 AND topic_id = $2",
        )
        .bind(user_id)
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn get_or_create_topic_preference(
        &self,
        user_id: Uuid,
        topic_id: i64,
    ) -> PortResult<TopicPreference> {
        let record = sqlx::query_as::<_, TopicPreferenceRecord>(
            "INSERT INTO topic_preferences (user_id, topic_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, topic_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id, user_id, topic_id, send_newsletter",
        )
        .bind(user_id)
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn set_send_newsletter(
        &self,
        preference_id: i64,
        enabled: bool,
    ) -> PortResult<TopicPreference> {
        let record = sqlx::query_as::<_, TopicPreferenceRecord>(
            "UPDATE topic_preferences SET send_newsletter = $1 WHERE id = $2 \
             RETURNING id, user_id, topic_id, send_newsletter",
        )
        .bind(enabled)
        .bind(preference_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            not_found_or_unexpected(e, format!("Topic preference {} not found", preference_id))
        })?;
        Ok(record.to_domain())
    }

    async fn list_topic_preferences(&self, user_id: Uuid) -> PortResult<Vec<TopicPreference>> {
        let records = sqlx::query_as::<_, TopicPreferenceRecord>(
            "SELECT id, user_id, topic_id, send_newsletter FROM topic_preferences \
             WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
