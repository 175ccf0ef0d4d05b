//! crates/insight_core/src/preferences.rs
//!
//! Attaches topics to users and manages the two notification flags.
//! Also serves the per-user read views (topics, summaries, preferences).

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Summary, Topic, TopicPreference, UserPreference};
use crate::period::Period;
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::queue::{EnqueueOutcome, SummaryQueue};

/// Which preference record an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKind {
    User,
    Topic,
}

impl FromStr for PreferenceKind {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(PreferenceKind::User),
            "TOPIC" => Ok(PreferenceKind::Topic),
            _ => Err(PortError::InvalidInput(format!(
                "Unknown preference type '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceUpdate {
    User {
        send_notification_when_ready: bool,
    },
    Topic {
        topic_id: Option<i64>,
        send_newsletter: bool,
    },
}

impl PreferenceUpdate {
    /// Picks the flag relevant to `kind`; the other one is ignored.
    pub fn new(
        kind: PreferenceKind,
        topic_id: Option<i64>,
        send_newsletter: bool,
        send_notification_when_ready: bool,
    ) -> Self {
        match kind {
            PreferenceKind::User => PreferenceUpdate::User {
                send_notification_when_ready,
            },
            PreferenceKind::Topic => PreferenceUpdate::Topic {
                topic_id,
                send_newsletter,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceView {
    User(UserPreference),
    Topic(TopicPreference),
}

/// Everything the user page shows.
#[derive(Debug, Clone)]
pub struct UserOverview {
    pub topics: Vec<Topic>,
    pub user_preference: UserPreference,
    pub topic_preferences: Vec<TopicPreference>,
}

/// A summary listed without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOverview {
    pub id: i64,
    pub topic_id: i64,
    pub topic_title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

pub struct PreferenceService {
    db: Arc<dyn DatabaseService>,
    queue: Arc<SummaryQueue>,
}

impl PreferenceService {
    pub fn new(db: Arc<dyn DatabaseService>, queue: Arc<SummaryQueue>) -> Self {
        Self { db, queue }
    }

    /// Puts the topic titled `title` on the user's list, creating it if no
    /// such topic exists, and asks for a first "day" summary.
    ///
    /// Idempotent: attaching twice yields one link and one `TopicPreference`.
    pub async fn attach_topic(&self, user_id: Uuid, title: &str) -> PortResult<Topic> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PortError::InvalidInput("Topic title must not be empty".to_string()));
        }

        let topic = match self.db.find_topic_by_title(title).await? {
            Some(topic) => {
                self.db.link_user_topic(user_id, topic.id).await?;
                topic
            }
            None => match self.db.create_topic(title, user_id).await {
                Ok(topic) => {
                    info!("Created topic {} '{}' for user {}.", topic.id, topic.title, user_id);
                    topic
                }
                // Lost a creation race on the unique title.
                Err(e) => {
                    let topic = self.db.find_topic_by_title(title).await?.ok_or(e)?;
                    self.db.link_user_topic(user_id, topic.id).await?;
                    topic
                }
            },
        };

        self.db
            .get_or_create_topic_preference(user_id, topic.id)
            .await?;

        let request = Period::Day.resolve(&topic.title, Local::now().date_naive());
        match self.queue.enqueue(request, user_id).await {
            Ok(EnqueueOutcome::Queued) => {}
            Ok(EnqueueOutcome::AlreadyQueued) => {
                info!("Daily summary of '{}' already in progress.", topic.title)
            }
            Err(e) => warn!("Could not request daily summary of '{}': {}", topic.title, e),
        }

        Ok(topic)
    }

    pub async fn set_preference(
        &self,
        user_id: Uuid,
        update: PreferenceUpdate,
    ) -> PortResult<PreferenceView> {
        match update {
            PreferenceUpdate::User {
                send_notification_when_ready,
            } => {
                let preference = self
                    .db
                    .set_send_notification_when_ready(user_id, send_notification_when_ready)
                    .await?;
                Ok(PreferenceView::User(preference))
            }
            PreferenceUpdate::Topic {
                topic_id,
                send_newsletter,
            } => {
                let topic_id = topic_id
                    .ok_or_else(|| PortError::NotFound("Topic id is required".to_string()))?;
                let topic = self.db.get_topic_by_id(topic_id).await?;
                let preference = self
                    .db
                    .find_topic_preference(user_id, topic.id)
                    .await?
                    .ok_or_else(|| {
                        PortError::NotFound(format!(
                            "No preference of user {} for topic {}",
                            user_id, topic.id
                        ))
                    })?;
                let updated = self
                    .db
                    .set_send_newsletter(preference.id, send_newsletter)
                    .await?;
                Ok(PreferenceView::Topic(updated))
            }
        }
    }

    pub async fn overview(&self, user_id: Uuid) -> PortResult<UserOverview> {
        Ok(UserOverview {
            topics: self.db.list_topics_for_user(user_id).await?,
            user_preference: self.db.get_or_create_user_preference(user_id).await?,
            topic_preferences: self.db.list_topic_preferences(user_id).await?,
        })
    }

    /// Summaries across the user's topics. `NotFound` when there are none.
    pub async fn summaries_for(&self, user_id: Uuid) -> PortResult<Vec<SummaryOverview>> {
        let topics = self.db.list_topics_for_user(user_id).await?;
        let overviews: Vec<SummaryOverview> = topics
            .iter()
            .flat_map(|topic| {
                topic.summaries.iter().map(move |s| SummaryOverview {
                    id: s.id,
                    topic_id: topic.id,
                    topic_title: topic.title.clone(),
                    start_date: s.start_date,
                    end_date: s.end_date,
                    created_at: s.created_at,
                })
            })
            .collect();

        if overviews.is_empty() {
            return Err(PortError::NotFound(format!(
                "No summaries for user {}",
                user_id
            )));
        }
        Ok(overviews)
    }

    /// A single summary, readable only through one of the user's topics.
    pub async fn summary_for(&self, user_id: Uuid, summary_id: i64) -> PortResult<Summary> {
        let summary = self.db.get_summary_by_id(summary_id).await?;
        let topics = self.db.list_topics_for_user(user_id).await?;
        if topics.iter().any(|t| t.contains_summary(summary.id)) {
            Ok(summary)
        } else {
            Err(PortError::Forbidden(format!(
                "Summary {} is not accessible to user {}",
                summary_id, user_id
            )))
        }
    }
}
