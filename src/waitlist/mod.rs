/// Waitlist Promotion Engine
///
/// Enrolls players onto the waitlist of a full event, offers freed spots in
/// arrival order and keeps positions compact after departures. Tournaments
/// and leagues store their waitlists differently, so each kind gets its own
/// [`WaitlistBackend`] and [`WaitlistManager`] picks one per call.

pub mod league;
pub mod manager;
pub mod models;
pub mod tournament;

pub use league::LeagueWaitlist;
pub use manager::WaitlistManager;
pub use models::*;
pub use tournament::TournamentWaitlist;

use crate::{
    error::{WaitlistError, WaitlistResult},
    metrics,
    notify::{Notification, Notifier},
};
use async_trait::async_trait;

/// Hours a player has to accept an offered tournament spot
pub const OFFER_WINDOW_HOURS: i64 = 24;

/// Attempts at allocate-and-insert before a slot conflict is reported
pub(crate) const ENROLL_ATTEMPTS: u32 = 3;

/// Attempts at claiming the head of the line when another caller takes it first
pub(crate) const PROMOTE_ATTEMPTS: u32 = 3;

pub const MSG_NO_OFFER: &str = "No spot offer found";
pub const MSG_OFFER_EXPIRED: &str = "Spot offer has expired";
pub const MSG_ACCEPTED: &str = "Spot accepted successfully";
pub const MSG_DECLINED: &str = "Spot declined. The next person in line will be notified.";
pub const MSG_TOURNAMENT_ONLY: &str = "Accept spot is only available for tournaments";
pub const MSG_LEFT: &str = "You have left the waitlist";
pub const MSG_NOT_ON_WAITLIST: &str = "You are not on the waitlist";

pub const NOTE_OFFER_EXPIRED: &str = "Spot offer expired";
pub const NOTE_OFFER_DECLINED: &str = "Spot offer declined";
pub const NOTE_OFFER_EXPIRED_AUTO: &str = "Spot offer expired automatically";
pub const NOTE_LEFT_WAITLIST: &str = "Left waitlist";

/// Storage strategy for one event kind
#[async_trait]
pub trait WaitlistBackend: Send + Sync {
    /// Event kind served by this backend
    fn kind(&self) -> EventKind;

    /// Slot the next entrant would receive (positive position or negative rank)
    async fn next_position(&self, event_id: &str, subgroup_id: Option<&str>)
        -> WaitlistResult<i64>;

    /// Add a user to the back of the line
    async fn enroll(
        &self,
        user_id: &str,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<Enrollment>;

    /// Advance the head of the line, if any
    async fn promote(&self, event_id: &str) -> WaitlistResult<Option<Promotion>>;

    /// Compact positions after a departure
    async fn reorder(&self, event_id: &str) -> WaitlistResult<()>;

    /// The user's place in line
    async fn position_for(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> WaitlistResult<Option<WaitlistPosition>>;

    /// Everyone in line, soonest-promoted first
    async fn list_entries(&self, event_id: &str) -> WaitlistResult<Vec<WaitlistEntry>>;

    /// Confirmed participants against the event limit
    async fn capacity(&self, event_id: &str) -> WaitlistResult<Capacity>;

    /// Remove the user from the line; false when they were not waiting
    async fn withdraw(&self, user_id: &str, event_id: &str) -> WaitlistResult<bool>;
}

/// Send a notification, logging and discarding any failure
pub(crate) async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    let user_id = notification.user_id.clone();
    let kind = notification.kind;

    if let Err(e) = notifier.notify(notification).await {
        metrics::record_notification_failure();
        tracing::warn!(
            "Failed to send {} notification to {}: {}",
            kind.as_str(),
            user_id,
            e
        );
    }
}

/// Whether allocate-and-insert lost to a concurrent writer and may be retried.
///
/// Either a unique index rejected the slot or the write lock stayed taken
/// past the busy timeout.
pub(crate) fn is_slot_contention(err: &WaitlistError) -> bool {
    match err {
        WaitlistError::Database(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            true
        }
        WaitlistError::Database(e) => crate::db::is_busy(e),
        _ => false,
    }
}
