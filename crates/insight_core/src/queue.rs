//! crates/insight_core/src/queue.rs
//!
//! The summarization request lifecycle: deduplication of in-flight requests,
//! dispatch to the external worker, and completion or failure handling.
//!
//! A request moves through `Requested -> Queued | AlreadyQueued -> Dispatched
//! -> Completed | Failed`. The pending entry exists from reservation until
//! completion, failure, or a failed dispatch.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{PendingSummary, Summary, SummaryRequest};
use crate::ports::{
    DatabaseService, MessagingService, PortError, PortResult, SummarizationService,
};

//=========================================================================================
// Pending Registry (Deduplicator)
//=========================================================================================

/// Tracks in-flight summarization requests, at most one per descriptor.
///
/// Check-and-set goes through the map's entry API, so two concurrent
/// reservations of the same descriptor cannot both succeed.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: DashMap<SummaryRequest, PendingSummary>,
    ttl: Option<Duration>,
}

impl PendingRegistry {
    /// A registry whose entries live until completion or failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose entries count as absent once older than `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    pub fn is_queued(&self, request: &SummaryRequest) -> bool {
        let now = Utc::now();
        self.entries
            .get(request)
            .map(|entry| !self.is_expired(entry.value(), now))
            .unwrap_or(false)
    }

    /// Marks `request` as in flight for `requester_id`.
    ///
    /// Returns `false` without touching the registry when a live entry
    /// already exists.
    pub fn try_reserve(&self, request: SummaryRequest, requester_id: Uuid) -> bool {
        self.reserve_at(request, requester_id, Utc::now())
    }

    fn reserve_at(&self, request: SummaryRequest, requester_id: Uuid, now: DateTime<Utc>) -> bool {
        let pending = PendingSummary {
            requester_id,
            queued_at: now,
        };
        match self.entries.entry(request) {
            Entry::Vacant(vacant) => {
                vacant.insert(pending);
                true
            }
            Entry::Occupied(mut occupied) => {
                if self.is_expired(occupied.get(), now) {
                    occupied.insert(pending);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// The entry for `request`, expired or not.
    pub fn get(&self, request: &SummaryRequest) -> Option<PendingSummary> {
        self.entries.get(request).map(|entry| entry.value().clone())
    }

    /// Removes the entry, returning it if there was one.
    pub fn release(&self, request: &SummaryRequest) -> Option<PendingSummary> {
        self.entries.remove(request).map(|(_, pending)| pending)
    }

    /// Removes the entry only if it is still `expected`. A reservation that
    /// replaced it after expiry is left alone.
    pub fn release_if_current(
        &self,
        request: &SummaryRequest,
        expected: &PendingSummary,
    ) -> Option<PendingSummary> {
        self.entries
            .remove_if(request, |_, pending| pending == expected)
            .map(|(_, pending)| pending)
    }

    /// Drops every expired entry. A no-op without a TTL.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Utc::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, pending| !self.is_expired(pending, now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, pending: &PendingSummary, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - pending.queued_at > ttl,
            None => false,
        }
    }
}

//=========================================================================================
// Summary Queue (Dispatcher)
//=========================================================================================

/// What happened to an enqueue call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Reserved and handed to the worker.
    Queued,
    /// An equivalent request is already in flight; nothing was dispatched.
    AlreadyQueued,
}

/// Dispatches de-duplicated requests to the summarization worker and
/// reconciles their results.
pub struct SummaryQueue {
    pending: PendingRegistry,
    db: Arc<dyn DatabaseService>,
    summarizer: Arc<dyn SummarizationService>,
    messenger: Arc<dyn MessagingService>,
}

impl SummaryQueue {
    pub fn new(
        pending: PendingRegistry,
        db: Arc<dyn DatabaseService>,
        summarizer: Arc<dyn SummarizationService>,
        messenger: Arc<dyn MessagingService>,
    ) -> Self {
        Self {
            pending,
            db,
            summarizer,
            messenger,
        }
    }

    pub fn pending(&self) -> &PendingRegistry {
        &self.pending
    }

    pub fn is_queued(&self, request: &SummaryRequest) -> bool {
        self.pending.is_queued(request)
    }

    /// Reserves `request` and hands it to the worker.
    ///
    /// If the worker cannot be reached the reservation is rolled back and
    /// `PortError::DispatchFailure` is returned, so the client may retry.
    pub async fn enqueue(
        &self,
        request: SummaryRequest,
        requester_id: Uuid,
    ) -> PortResult<EnqueueOutcome> {
        let reserved_at = Utc::now();
        if !self.pending.reserve_at(request.clone(), requester_id, reserved_at) {
            info!(
                "Summary of '{}' ({} to {}) already in progress.",
                request.topic_title, request.start_date, request.end_date
            );
            return Ok(EnqueueOutcome::AlreadyQueued);
        }

        match self.summarizer.request_summary(&request).await {
            Ok(()) => {
                info!(
                    "Dispatched summary of '{}' ({} to {}) for user {}.",
                    request.topic_title, request.start_date, request.end_date, requester_id
                );
                Ok(EnqueueOutcome::Queued)
            }
            Err(e) => {
                let reservation = PendingSummary {
                    requester_id,
                    queued_at: reserved_at,
                };
                self.pending.release_if_current(&request, &reservation);
                warn!(
                    "Dispatch of summary for '{}' failed, reservation released: {}",
                    request.topic_title, e
                );
                let message = match e {
                    PortError::DispatchFailure(message) => message,
                    other => other.to_string(),
                };
                Err(PortError::DispatchFailure(message))
            }
        }
    }

    /// Stores the worker's result under its topic and clears the pending entry.
    ///
    /// Only a request that is still pending is accepted; anything else is
    /// `PortError::NotFound` and nothing is stored. The entry is kept when
    /// the summary cannot be saved, so the worker may report again.
    pub async fn complete(&self, request: SummaryRequest, content: &str) -> PortResult<Summary> {
        let pending = self.pending.get(&request).ok_or_else(|| {
            PortError::NotFound(format!(
                "No pending summary of '{}' from {} to {}",
                request.topic_title, request.start_date, request.end_date
            ))
        })?;

        let topic = match self.db.find_topic_by_title(&request.topic_title).await? {
            Some(topic) => topic,
            None => {
                self.pending.release_if_current(&request, &pending);
                return Err(PortError::NotFound(format!(
                    "Topic '{}' not found",
                    request.topic_title
                )));
            }
        };

        let summary = self
            .db
            .save_summary(topic.id, request.start_date, request.end_date, content)
            .await?;
        self.pending.release_if_current(&request, &pending);
        info!("Stored summary {} for topic '{}'.", summary.id, topic.title);

        let text = format!(
            "Your summary of '{}' from {} to {} is ready.",
            topic.title, request.start_date, request.end_date
        );
        self.notify_if_opted_in(pending.requester_id, &text).await;

        Ok(summary)
    }

    /// Clears the pending entry of a request the worker gave up on.
    pub async fn fail(&self, request: &SummaryRequest, reason: &str) -> Option<PendingSummary> {
        let pending = self.pending.release(request);
        warn!(
            "Summary of '{}' ({} to {}) failed: {}",
            request.topic_title, request.start_date, request.end_date, reason
        );

        if let Some(pending) = &pending {
            let text = format!(
                "We could not summarize '{}' from {} to {}. Please try again.",
                request.topic_title, request.start_date, request.end_date
            );
            self.notify_if_opted_in(pending.requester_id, &text).await;
        }

        pending
    }

    // Best-effort: errors are logged, never returned.
    async fn notify_if_opted_in(&self, user_id: Uuid, text: &str) {
        match self.db.get_or_create_user_preference(user_id).await {
            Ok(preference) if preference.send_notification_when_ready => {
                if let Err(e) = self.messenger.send_message(user_id, text).await {
                    warn!("Failed to notify user {}: {}", user_id, e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not load preferences of user {}: {}", user_id, e),
        }
    }
}
