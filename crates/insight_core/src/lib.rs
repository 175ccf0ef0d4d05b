pub mod domain;
pub mod period;
pub mod ports;
pub mod preferences;
pub mod queue;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use domain::{
    PendingSummary, Summary, SummaryRequest, Topic, TopicPreference, User, UserCredentials,
    UserPreference,
};
pub use period::{resolve_period, Period};
pub use ports::{DatabaseService, MessagingService, PortError, PortResult, SummarizationService};
pub use preferences::{
    PreferenceKind, PreferenceService, PreferenceUpdate, PreferenceView, SummaryOverview,
    UserOverview,
};
pub use queue::{EnqueueOutcome, PendingRegistry, SummaryQueue};
