/// Waitlist manager
///
/// Entry point for every waitlist operation. Picks the backend for the
/// event kind and drives the tournament offer lifecycle: accept, decline,
/// leave and the expiry sweep, each followed by the reorder and promote
/// cascade that hands a freed spot to the next player.
use super::{
    Capacity, Enrollment, EventKind, LeagueWaitlist, OfferOutcome, Promotion,
    TournamentWaitlist, WaitlistBackend, WaitlistEntry, WaitlistPosition, MSG_ACCEPTED,
    MSG_DECLINED, MSG_LEFT, MSG_NOT_ON_WAITLIST, MSG_NO_OFFER, MSG_OFFER_EXPIRED,
    MSG_TOURNAMENT_ONLY, NOTE_OFFER_DECLINED, NOTE_OFFER_EXPIRED, NOTE_OFFER_EXPIRED_AUTO,
};
use crate::{db, error::WaitlistResult, metrics, notify::Notifier};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Waitlist manager
#[derive(Clone)]
pub struct WaitlistManager {
    tournaments: TournamentWaitlist,
    leagues: LeagueWaitlist,
}

impl WaitlistManager {
    /// Create a new waitlist manager
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            tournaments: TournamentWaitlist::new(db.clone(), notifier.clone()),
            leagues: LeagueWaitlist::new(db, notifier),
        }
    }

    /// Backend for an event kind
    pub fn backend(&self, kind: EventKind) -> &dyn WaitlistBackend {
        match kind {
            EventKind::Tournament => &self.tournaments,
            EventKind::League => &self.leagues,
        }
    }

    /// Slot the next entrant would receive
    pub async fn next_position(
        &self,
        kind: EventKind,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<i64> {
        self.backend(kind).next_position(event_id, subgroup_id).await
    }

    /// Put a user on an event's waitlist.
    ///
    /// Does not check capacity; callers gate on [`Self::is_event_full`] first.
    pub async fn enroll(
        &self,
        user_id: &str,
        kind: EventKind,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<Enrollment> {
        self.backend(kind).enroll(user_id, event_id, subgroup_id).await
    }

    pub async fn get_position(
        &self,
        user_id: &str,
        kind: EventKind,
        event_id: &str,
    ) -> WaitlistResult<Option<WaitlistPosition>> {
        self.backend(kind).position_for(user_id, event_id).await
    }

    /// Advance the head of an event's line. Safe to call redundantly.
    pub async fn promote(
        &self,
        kind: EventKind,
        event_id: &str,
    ) -> WaitlistResult<Option<Promotion>> {
        self.backend(kind).promote(event_id).await
    }

    pub async fn reorder(&self, kind: EventKind, event_id: &str) -> WaitlistResult<()> {
        self.backend(kind).reorder(event_id).await
    }

    pub async fn list_entries(
        &self,
        kind: EventKind,
        event_id: &str,
    ) -> WaitlistResult<Vec<WaitlistEntry>> {
        self.backend(kind).list_entries(event_id).await
    }

    pub async fn is_event_full(&self, kind: EventKind, event_id: &str) -> WaitlistResult<Capacity> {
        self.backend(kind).capacity(event_id).await
    }

    /// Accept an open tournament spot offer
    pub async fn accept(
        &self,
        user_id: &str,
        kind: EventKind,
        event_id: &str,
    ) -> WaitlistResult<OfferOutcome> {
        if kind != EventKind::Tournament {
            return Ok(OfferOutcome::failure(MSG_TOURNAMENT_ONLY));
        }

        let Some(offer) = self.tournaments.find_offer(user_id, event_id).await? else {
            return Ok(OfferOutcome::failure(MSG_NO_OFFER));
        };

        if db::now() > offer.spot_expires_at {
            if self
                .tournaments
                .withdraw_offer(&offer.registration_id, NOTE_OFFER_EXPIRED)
                .await?
            {
                info!(
                    "Spot offer {} for user {} expired before acceptance",
                    offer.registration_id, user_id
                );
                metrics::record_transition(EventKind::Tournament.as_str(), "expired");
                self.cascade(event_id).await?;
            }
            return Ok(OfferOutcome::failure(MSG_OFFER_EXPIRED));
        }

        if !self
            .tournaments
            .confirm_offer(&offer.registration_id, event_id)
            .await?
        {
            return Ok(OfferOutcome::failure(MSG_NO_OFFER));
        }

        info!(
            "User {} accepted spot in tournament {} (registration {})",
            user_id, event_id, offer.registration_id
        );
        metrics::record_transition(EventKind::Tournament.as_str(), "accepted");

        self.tournaments.reorder(event_id).await?;
        self.tournaments
            .notify_accepted(user_id, event_id, &offer.registration_id)
            .await;

        Ok(OfferOutcome::success(MSG_ACCEPTED))
    }

    /// Decline an open tournament spot offer and pass it down the line
    pub async fn decline(
        &self,
        user_id: &str,
        kind: EventKind,
        event_id: &str,
    ) -> WaitlistResult<OfferOutcome> {
        if kind != EventKind::Tournament {
            return Ok(OfferOutcome::failure(MSG_TOURNAMENT_ONLY));
        }

        let Some(offer) = self.tournaments.find_offer(user_id, event_id).await? else {
            return Ok(OfferOutcome::failure(MSG_NO_OFFER));
        };

        if !self
            .tournaments
            .withdraw_offer(&offer.registration_id, NOTE_OFFER_DECLINED)
            .await?
        {
            return Ok(OfferOutcome::failure(MSG_NO_OFFER));
        }

        info!(
            "User {} declined spot in tournament {} (registration {})",
            user_id, event_id, offer.registration_id
        );
        metrics::record_transition(EventKind::Tournament.as_str(), "declined");

        self.cascade(event_id).await?;

        Ok(OfferOutcome::success(MSG_DECLINED))
    }

    /// Take a waiting user out of line
    pub async fn leave(
        &self,
        user_id: &str,
        kind: EventKind,
        event_id: &str,
    ) -> WaitlistResult<OfferOutcome> {
        if self.backend(kind).withdraw(user_id, event_id).await? {
            Ok(OfferOutcome::success(MSG_LEFT))
        } else {
            Ok(OfferOutcome::failure(MSG_NOT_ON_WAITLIST))
        }
    }

    /// Withdraw every lapsed tournament offer and pass each spot on.
    ///
    /// Returns how many offers this call expired. Offers already handled by
    /// a concurrent sweep or a late accept are skipped, so an immediate
    /// second run returns 0.
    pub async fn sweep_expired_offers(&self) -> WaitlistResult<u64> {
        let offers = self.tournaments.expired_offers(db::now()).await?;
        let mut expired = 0;

        for offer in offers {
            if !self
                .tournaments
                .withdraw_offer(&offer.registration_id, NOTE_OFFER_EXPIRED_AUTO)
                .await?
            {
                debug!("Offer {} already resolved, skipping", offer.registration_id);
                continue;
            }

            expired += 1;
            info!(
                "Expired spot offer {} for user {} in tournament {}",
                offer.registration_id, offer.user_id, offer.tournament_id
            );
            metrics::record_transition(EventKind::Tournament.as_str(), "expired");

            self.tournaments.notify_expired(&offer).await;
            self.cascade(&offer.tournament_id).await?;
        }

        Ok(expired)
    }

    /// Close the gap a departure left and offer the freed spot
    async fn cascade(&self, tournament_id: &str) -> WaitlistResult<Option<Promotion>> {
        self.tournaments.reorder(tournament_id).await?;
        self.tournaments.promote(tournament_id).await
    }
}
