/// Tournament waitlist
///
/// Registrations carry an explicit 1-based `waitlist_position` per
/// tournament and division. The head of the line is offered the spot for
/// [`OFFER_WINDOW_HOURS`] and must accept before it counts as taken.
use super::{
    is_slot_contention, notify_best_effort, Capacity, Enrollment, EntryUser, EventKind,
    Promotion, RegistrationStatus, SpotOffer, WaitlistBackend, WaitlistEntry, WaitlistPosition,
    ENROLL_ATTEMPTS, OFFER_WINDOW_HOURS, PROMOTE_ATTEMPTS,
};
use crate::{
    db,
    error::{WaitlistError, WaitlistResult},
    metrics,
    notify::{Notification, NotificationType, Notifier},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Tournament waitlist backend
#[derive(Clone)]
pub struct TournamentWaitlist {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
}

impl TournamentWaitlist {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Next free position for a tournament division, read inside the caller's transaction
    async fn allocate_position(
        conn: &mut SqliteConnection,
        tournament_id: &str,
        division_id: Option<&str>,
    ) -> WaitlistResult<i64> {
        let position: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(waitlist_position), 0) + 1
            FROM tournament_registrations
            WHERE tournament_id = ?1
              AND IFNULL(division_id, '') = IFNULL(?2, '')
              AND status = 'waitlisted'
            "#,
        )
        .bind(tournament_id)
        .bind(division_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(position)
    }

    async fn ensure_tournament(&self, tournament_id: &str) -> WaitlistResult<(String, Option<i64>, i64)> {
        let row = sqlx::query(
            "SELECT name, max_participants, current_participants FROM tournaments WHERE id = ?1",
        )
        .bind(tournament_id)
        .fetch_optional(&self.db)
        .await?;

        let row = row.ok_or_else(|| {
            WaitlistError::NotFound(format!("Tournament {} not found", tournament_id))
        })?;

        Ok((
            row.try_get("name")?,
            row.try_get("max_participants")?,
            row.try_get("current_participants")?,
        ))
    }

    async fn try_enroll(
        &self,
        user_id: &str,
        tournament_id: &str,
        division_id: Option<&str>,
    ) -> WaitlistResult<Enrollment> {
        let mut tx = db::begin_immediate(&self.db).await?;

        let position = Self::allocate_position(&mut tx, tournament_id, division_id).await?;
        let registration_id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO tournament_registrations
            (id, tournament_id, division_id, status, waitlist_position, registered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&registration_id)
        .bind(tournament_id)
        .bind(division_id)
        .bind(RegistrationStatus::Waitlisted.as_str())
        .bind(position)
        .bind(db::format_timestamp(db::now()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO registration_players (registration_id, user_id, is_captain) VALUES (?1, ?2, 1)",
        )
        .bind(&registration_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Enrollment {
            entry_id: registration_id,
            position,
        })
    }

    /// The user's open offer for a tournament
    pub async fn find_offer(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> WaitlistResult<Option<SpotOffer>> {
        let row = sqlx::query(
            r#"
            SELECT r.id, r.tournament_id, r.spot_expires_at, p.user_id
            FROM tournament_registrations r
            JOIN registration_players p ON p.registration_id = r.id
            WHERE r.tournament_id = ?1
              AND p.user_id = ?2
              AND r.status = 'spot_offered'
            ORDER BY r.spot_offered_at DESC
            LIMIT 1
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| parse_offer(&row)).transpose()
    }

    /// Offers whose window closed before `now`, across all tournaments
    pub async fn expired_offers(&self, now: DateTime<Utc>) -> WaitlistResult<Vec<SpotOffer>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.tournament_id, r.spot_expires_at, p.user_id
            FROM tournament_registrations r
            JOIN registration_players p ON p.registration_id = r.id AND p.is_captain = 1
            WHERE r.status = 'spot_offered'
              AND r.spot_expires_at < ?1
            ORDER BY r.spot_expires_at ASC
            "#,
        )
        .bind(db::format_timestamp(now))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_offer).collect()
    }

    /// Move an open offer to `withdrawn`; false when it is no longer open
    pub async fn withdraw_offer(&self, registration_id: &str, notes: &str) -> WaitlistResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tournament_registrations
            SET status = 'withdrawn',
                waitlist_position = NULL,
                spot_offered_at = NULL,
                spot_expires_at = NULL,
                withdrawn_at = ?1,
                notes = ?2
            WHERE id = ?3 AND status = 'spot_offered'
            "#,
        )
        .bind(db::format_timestamp(db::now()))
        .bind(notes)
        .bind(registration_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Turn an open offer into a held spot awaiting payment; false when it is no longer open
    pub async fn confirm_offer(&self, registration_id: &str, tournament_id: &str) -> WaitlistResult<bool> {
        let mut tx = db::begin_immediate(&self.db).await?;

        let result = sqlx::query(
            r#"
            UPDATE tournament_registrations
            SET status = 'pending_payment',
                waitlist_position = NULL,
                spot_offered_at = NULL,
                spot_expires_at = NULL
            WHERE id = ?1 AND status = 'spot_offered'
            "#,
        )
        .bind(registration_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE tournaments SET current_participants = current_participants + 1 WHERE id = ?1",
        )
        .bind(tournament_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Tell the user their held spot needs payment
    pub async fn notify_accepted(&self, user_id: &str, tournament_id: &str, registration_id: &str) {
        let name = self
            .ensure_tournament(tournament_id)
            .await
            .map(|(name, _, _)| name)
            .unwrap_or_else(|_| "the tournament".to_string());

        notify_best_effort(
            self.notifier.as_ref(),
            Notification {
                user_id: user_id.to_string(),
                kind: NotificationType::SpotAccepted,
                title: "You're in!".to_string(),
                message: format!(
                    "Your spot in {} is reserved. Complete payment to confirm your registration.",
                    name
                ),
                data: json!({
                    "tournamentId": tournament_id,
                    "registrationId": registration_id,
                }),
            },
        )
        .await;
    }

    /// Tell the user their offer lapsed
    pub async fn notify_expired(&self, offer: &SpotOffer) {
        notify_best_effort(
            self.notifier.as_ref(),
            Notification {
                user_id: offer.user_id.clone(),
                kind: NotificationType::SpotExpired,
                title: "Spot offer expired".to_string(),
                message: "Your spot offer expired before it was accepted. The spot has been offered to the next person in line.".to_string(),
                data: json!({
                    "tournamentId": offer.tournament_id,
                    "registrationId": offer.registration_id,
                }),
            },
        )
        .await;
    }
}

fn parse_offer(row: &sqlx::sqlite::SqliteRow) -> WaitlistResult<SpotOffer> {
    let expires_at: String = row.try_get("spot_expires_at")?;

    Ok(SpotOffer {
        registration_id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        user_id: row.try_get("user_id")?,
        spot_expires_at: db::parse_timestamp(&expires_at)?,
    })
}

#[async_trait]
impl WaitlistBackend for TournamentWaitlist {
    fn kind(&self) -> EventKind {
        EventKind::Tournament
    }

    async fn next_position(
        &self,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<i64> {
        let mut conn = self.db.acquire().await?;
        Self::allocate_position(&mut conn, event_id, subgroup_id).await
    }

    async fn enroll(
        &self,
        user_id: &str,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<Enrollment> {
        let (name, _, _) = self.ensure_tournament(event_id).await?;

        let mut attempt = 1;
        let enrollment = loop {
            match self.try_enroll(user_id, event_id, subgroup_id).await {
                Ok(enrollment) => break enrollment,
                Err(e) if is_slot_contention(&e) && attempt < ENROLL_ATTEMPTS => {
                    tracing::warn!(
                        "Waitlist slot for tournament {} taken concurrently, retrying (attempt {})",
                        event_id,
                        attempt
                    );
                    attempt += 1;
                }
                Err(e) if is_slot_contention(&e) => {
                    return Err(WaitlistError::Conflict(
                        "Could not allocate a waitlist position, please retry".to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            "User {} joined waitlist for tournament {} at position {}",
            user_id,
            event_id,
            enrollment.position
        );
        metrics::record_transition(EventKind::Tournament.as_str(), "enrolled");

        notify_best_effort(
            self.notifier.as_ref(),
            Notification {
                user_id: user_id.to_string(),
                kind: NotificationType::WaitlistJoined,
                title: "You're on the waitlist".to_string(),
                message: format!(
                    "You are #{} on the waitlist for {}. We'll notify you if a spot opens up.",
                    enrollment.position, name
                ),
                data: json!({
                    "tournamentId": event_id,
                    "registrationId": enrollment.entry_id,
                    "position": enrollment.position,
                }),
            },
        )
        .await;

        Ok(enrollment)
    }

    async fn promote(&self, event_id: &str) -> WaitlistResult<Option<Promotion>> {
        for _ in 0..PROMOTE_ATTEMPTS {
            let next = sqlx::query(
                r#"
                SELECT r.id, p.user_id
                FROM tournament_registrations r
                JOIN registration_players p ON p.registration_id = r.id AND p.is_captain = 1
                WHERE r.tournament_id = ?1 AND r.status = 'waitlisted'
                ORDER BY r.waitlist_position ASC, r.registered_at ASC, r.id ASC
                LIMIT 1
                "#,
            )
            .bind(event_id)
            .fetch_optional(&self.db)
            .await?;

            let Some(row) = next else {
                tracing::debug!("No waitlisted registrations to promote for tournament {}", event_id);
                return Ok(None);
            };

            let registration_id: String = row.try_get("id")?;
            let user_id: String = row.try_get("user_id")?;

            let offered_at = db::now();
            let expires_at = offered_at + Duration::hours(OFFER_WINDOW_HOURS);

            let result = sqlx::query(
                r#"
                UPDATE tournament_registrations
                SET status = 'spot_offered',
                    waitlist_position = NULL,
                    spot_offered_at = ?1,
                    spot_expires_at = ?2
                WHERE id = ?3 AND status = 'waitlisted'
                "#,
            )
            .bind(db::format_timestamp(offered_at))
            .bind(db::format_timestamp(expires_at))
            .bind(&registration_id)
            .execute(&self.db)
            .await?;

            if result.rows_affected() == 0 {
                // Someone else moved this registration first; look again
                continue;
            }

            tracing::info!(
                "Offered tournament {} spot to user {} (registration {}), expires {}",
                event_id,
                user_id,
                registration_id,
                expires_at
            );
            metrics::record_transition(EventKind::Tournament.as_str(), "offered");

            notify_best_effort(
                self.notifier.as_ref(),
                Notification {
                    user_id: user_id.clone(),
                    kind: NotificationType::SpotOffered,
                    title: "A spot opened up!".to_string(),
                    message: format!(
                        "A spot is available for you. You have {} hours to accept it (until {}). Accept or decline the spot from the tournament page.",
                        OFFER_WINDOW_HOURS,
                        expires_at.format("%Y-%m-%d %H:%M UTC")
                    ),
                    data: json!({
                        "tournamentId": event_id,
                        "registrationId": registration_id,
                        "expiresAt": db::format_timestamp(expires_at),
                        "action": "accept_or_decline",
                    }),
                },
            )
            .await;

            return Ok(Some(Promotion {
                user_id,
                entry_id: registration_id,
            }));
        }

        Err(WaitlistError::Conflict(format!(
            "Waitlist for tournament {} changed during promotion, please retry",
            event_id
        )))
    }

    async fn reorder(&self, event_id: &str) -> WaitlistResult<()> {
        let mut tx = db::begin_immediate(&self.db).await?;

        let rows = sqlx::query(
            r#"
            SELECT id, division_id, waitlist_position
            FROM tournament_registrations
            WHERE tournament_id = ?1 AND status = 'waitlisted'
            ORDER BY IFNULL(division_id, ''), waitlist_position ASC, registered_at ASC, id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut current_division: Option<Option<String>> = None;
        let mut next = 0_i64;
        let mut moved = 0_u64;

        for row in rows {
            let id: String = row.try_get("id")?;
            let division: Option<String> = row.try_get("division_id")?;
            let position: Option<i64> = row.try_get("waitlist_position")?;

            if current_division.as_ref() != Some(&division) {
                current_division = Some(division);
                next = 0;
            }
            next += 1;

            if position == Some(next) {
                continue;
            }

            sqlx::query(
                "UPDATE tournament_registrations SET waitlist_position = ?1 WHERE id = ?2 AND status = 'waitlisted'",
            )
            .bind(next)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
            moved += 1;
        }

        tx.commit().await?;

        tracing::debug!("Reordered tournament {} waitlist, {} positions changed", event_id, moved);
        Ok(())
    }

    async fn position_for(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> WaitlistResult<Option<WaitlistPosition>> {
        let row = sqlx::query(
            r#"
            SELECT r.division_id, r.status, r.waitlist_position, r.spot_offered_at, r.spot_expires_at
            FROM tournament_registrations r
            JOIN registration_players p ON p.registration_id = r.id
            WHERE r.tournament_id = ?1
              AND p.user_id = ?2
              AND r.status IN ('waitlisted', 'spot_offered')
            ORDER BY r.registered_at DESC
            LIMIT 1
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let division_id: Option<String> = row.try_get("division_id")?;
        let status = RegistrationStatus::from_str(&row.try_get::<String, _>("status")?)?;
        let position: Option<i64> = row.try_get("waitlist_position")?;

        let total_waitlisted: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tournament_registrations
            WHERE tournament_id = ?1
              AND IFNULL(division_id, '') = IFNULL(?2, '')
              AND status = 'waitlisted'
            "#,
        )
        .bind(event_id)
        .bind(&division_id)
        .fetch_one(&self.db)
        .await?;

        let estimated_wait_days = match status {
            RegistrationStatus::Waitlisted => {
                position.unwrap_or(0) * EventKind::Tournament.wait_days_per_position()
            }
            _ => 0,
        };

        Ok(Some(WaitlistPosition {
            position,
            total_waitlisted,
            estimated_wait_days,
            status: status.as_str().to_string(),
            spot_offered_at: db::parse_optional_timestamp(row.try_get("spot_offered_at")?)?,
            spot_expires_at: db::parse_optional_timestamp(row.try_get("spot_expires_at")?)?,
        }))
    }

    async fn list_entries(&self, event_id: &str) -> WaitlistResult<Vec<WaitlistEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.status, r.waitlist_position, r.spot_offered_at, r.spot_expires_at,
                   r.registered_at, p.user_id, u.display_name
            FROM tournament_registrations r
            JOIN registration_players p ON p.registration_id = r.id AND p.is_captain = 1
            LEFT JOIN users u ON u.id = p.user_id
            WHERE r.tournament_id = ?1 AND r.status IN ('waitlisted', 'spot_offered')
            ORDER BY CASE r.status WHEN 'spot_offered' THEN 0 ELSE 1 END,
                     r.waitlist_position ASC, r.registered_at ASC, r.id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let registered_at: String = row.try_get("registered_at")?;
                Ok(WaitlistEntry {
                    id: row.try_get("id")?,
                    position: row.try_get("waitlist_position")?,
                    status: row.try_get("status")?,
                    user: EntryUser {
                        id: row.try_get("user_id")?,
                        display_name: row.try_get("display_name")?,
                    },
                    spot_offered_at: db::parse_optional_timestamp(row.try_get("spot_offered_at")?)?,
                    spot_expires_at: db::parse_optional_timestamp(row.try_get("spot_expires_at")?)?,
                    registered_at: db::parse_timestamp(&registered_at)?,
                })
            })
            .collect()
    }

    async fn capacity(&self, event_id: &str) -> WaitlistResult<Capacity> {
        let (_, max, current) = self.ensure_tournament(event_id).await?;
        Ok(Capacity::new(current, max))
    }

    async fn withdraw(&self, user_id: &str, event_id: &str) -> WaitlistResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tournament_registrations
            SET status = 'withdrawn',
                waitlist_position = NULL,
                withdrawn_at = ?1,
                notes = ?2
            WHERE tournament_id = ?3
              AND status = 'waitlisted'
              AND id IN (SELECT registration_id FROM registration_players WHERE user_id = ?4)
            "#,
        )
        .bind(db::format_timestamp(db::now()))
        .bind(super::NOTE_LEFT_WAITLIST)
        .bind(event_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        tracing::info!("User {} left waitlist for tournament {}", user_id, event_id);
        metrics::record_transition(EventKind::Tournament.as_str(), "left");

        self.reorder(event_id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waitlist::testing::*;

    async fn setup() -> (SqlitePool, Arc<RecordingNotifier>, TournamentWaitlist) {
        let (pool, notifier) = recording().await;
        seed_tournament(&pool, "t1", Some(16), 16).await;
        let waitlist = TournamentWaitlist::new(pool.clone(), notifier.clone());
        (pool, notifier, waitlist)
    }

    #[tokio::test]
    async fn test_positions_count_up_from_one() {
        let (_pool, _notifier, waitlist) = setup().await;

        assert_eq!(waitlist.next_position("t1", None).await.unwrap(), 1);

        let first = waitlist.enroll("u1", "t1", None).await.unwrap();
        let second = waitlist.enroll("u2", "t1", None).await.unwrap();

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);
        assert_eq!(waitlist.next_position("t1", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_divisions_have_independent_lines() {
        let (_pool, _notifier, waitlist) = setup().await;

        waitlist.enroll("u1", "t1", Some("mixed")).await.unwrap();
        let other = waitlist.enroll("u2", "t1", Some("mens")).await.unwrap();
        let mixed = waitlist.enroll("u3", "t1", Some("mixed")).await.unwrap();

        assert_eq!(other.position, 1);
        assert_eq!(mixed.position, 2);
    }

    #[tokio::test]
    async fn test_enroll_unknown_tournament_is_not_found() {
        let (_pool, _notifier, waitlist) = setup().await;

        let err = waitlist.enroll("u1", "missing", None).await.unwrap_err();
        assert!(matches!(err, WaitlistError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enroll_survives_notification_failure() {
        let pool = pool().await;
        seed_tournament(&pool, "t1", Some(8), 8).await;
        let waitlist = TournamentWaitlist::new(pool.clone(), Arc::new(FailingNotifier));

        let enrollment = waitlist.enroll("u1", "t1", None).await.unwrap();
        let (status, position, ..) = registration_row(&pool, &enrollment.entry_id).await;

        assert_eq!(status, "waitlisted");
        assert_eq!(position, Some(1));
    }

    #[tokio::test]
    async fn test_enroll_notifies_with_position() {
        let (_pool, notifier, waitlist) = setup().await;

        waitlist.enroll("u1", "t1", None).await.unwrap();
        let sent = notifier.sent_to("u1");

        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationType::WaitlistJoined);
        assert_eq!(sent[0].data["position"], 1);
    }

    #[tokio::test]
    async fn test_promote_offers_head_with_exact_window() {
        let (pool, notifier, waitlist) = setup().await;

        let first = waitlist.enroll("u1", "t1", None).await.unwrap();
        let second = waitlist.enroll("u2", "t1", None).await.unwrap();

        let promotion = waitlist.promote("t1").await.unwrap().unwrap();
        assert_eq!(promotion.user_id, "u1");
        assert_eq!(promotion.entry_id, first.entry_id);

        let (status, position, offered_at, expires_at, _) =
            registration_row(&pool, &first.entry_id).await;
        assert_eq!(status, "spot_offered");
        assert_eq!(position, None);

        let offered_at = db::parse_timestamp(&offered_at.unwrap()).unwrap();
        let expires_at = db::parse_timestamp(&expires_at.unwrap()).unwrap();
        assert_eq!(expires_at - offered_at, Duration::hours(24));

        let (status, position, offered_at, ..) = registration_row(&pool, &second.entry_id).await;
        assert_eq!(status, "waitlisted");
        assert_eq!(position, Some(2));
        assert!(offered_at.is_none());

        let offers = notifier.sent_to("u1");
        assert_eq!(offers.last().unwrap().kind, NotificationType::SpotOffered);
        assert!(offers.last().unwrap().message.contains("24 hours"));
    }

    #[tokio::test]
    async fn test_promote_empty_waitlist_returns_none() {
        let (_pool, _notifier, waitlist) = setup().await;
        assert!(waitlist.promote("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reorder_compacts_each_division() {
        let (pool, _notifier, waitlist) = setup().await;

        let a = waitlist.enroll("u1", "t1", Some("mixed")).await.unwrap();
        let b = waitlist.enroll("u2", "t1", Some("mixed")).await.unwrap();
        let c = waitlist.enroll("u3", "t1", Some("mixed")).await.unwrap();
        let d = waitlist.enroll("u4", "t1", None).await.unwrap();
        let e = waitlist.enroll("u5", "t1", None).await.unwrap();

        waitlist.withdraw("u1", "t1").await.unwrap();
        waitlist.withdraw("u4", "t1").await.unwrap();

        assert_eq!(registration_row(&pool, &a.entry_id).await.1, None);
        assert_eq!(registration_row(&pool, &b.entry_id).await.1, Some(1));
        assert_eq!(registration_row(&pool, &c.entry_id).await.1, Some(2));
        assert_eq!(registration_row(&pool, &d.entry_id).await.1, None);
        assert_eq!(registration_row(&pool, &e.entry_id).await.1, Some(1));

        // Already compact: nothing moves
        waitlist.reorder("t1").await.unwrap();
        assert_eq!(registration_row(&pool, &c.entry_id).await.1, Some(2));
    }

    #[tokio::test]
    async fn test_withdraw_records_note() {
        let (pool, _notifier, waitlist) = setup().await;

        let entry = waitlist.enroll("u1", "t1", None).await.unwrap();
        assert!(waitlist.withdraw("u1", "t1").await.unwrap());
        assert!(!waitlist.withdraw("u1", "t1").await.unwrap());

        let (status, position, .., notes) = registration_row(&pool, &entry.entry_id).await;
        assert_eq!(status, "withdrawn");
        assert_eq!(position, None);
        assert_eq!(notes.as_deref(), Some("Left waitlist"));
    }

    #[tokio::test]
    async fn test_confirm_offer_increments_counter_once() {
        let (pool, _notifier, waitlist) = setup().await;

        let entry = waitlist.enroll("u1", "t1", None).await.unwrap();
        waitlist.promote("t1").await.unwrap();

        assert!(waitlist.confirm_offer(&entry.entry_id, "t1").await.unwrap());
        assert!(!waitlist.confirm_offer(&entry.entry_id, "t1").await.unwrap());

        let capacity = waitlist.capacity("t1").await.unwrap();
        assert_eq!(capacity.current_count, 17);

        let (status, _, offered_at, expires_at, _) = registration_row(&pool, &entry.entry_id).await;
        assert_eq!(status, "pending_payment");
        assert!(offered_at.is_none() && expires_at.is_none());
    }

    #[tokio::test]
    async fn test_expired_offers_only_past_deadline() {
        let (pool, _notifier, waitlist) = setup().await;

        let stale = waitlist.enroll("u1", "t1", None).await.unwrap();
        waitlist.enroll("u2", "t1", None).await.unwrap();
        waitlist.promote("t1").await.unwrap();
        waitlist.promote("t1").await.unwrap();
        backdate_offer(&pool, &stale.entry_id, 25).await;

        let expired = waitlist.expired_offers(db::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].registration_id, stale.entry_id);
        assert_eq!(expired[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_list_entries_puts_open_offers_first() {
        let (pool, _notifier, waitlist) = setup().await;
        seed_user(&pool, "u2", "Dana Dinks").await;

        waitlist.enroll("u1", "t1", None).await.unwrap();
        waitlist.enroll("u2", "t1", None).await.unwrap();
        waitlist.enroll("u3", "t1", None).await.unwrap();
        waitlist.promote("t1").await.unwrap();

        let entries = waitlist.list_entries("t1").await.unwrap();
        let users: Vec<_> = entries.iter().map(|e| e.user.id.as_str()).collect();

        assert_eq!(users, vec!["u1", "u2", "u3"]);
        assert_eq!(entries[0].status, "spot_offered");
        assert!(entries[0].spot_expires_at.is_some());
        assert_eq!(entries[1].position, Some(2));
        assert_eq!(entries[1].user.display_name.as_deref(), Some("Dana Dinks"));
    }

    #[tokio::test]
    async fn test_position_for_reports_wait_estimate() {
        let (_pool, _notifier, waitlist) = setup().await;

        waitlist.enroll("u1", "t1", None).await.unwrap();
        waitlist.enroll("u2", "t1", None).await.unwrap();

        let position = waitlist.position_for("u2", "t1").await.unwrap().unwrap();
        assert_eq!(position.position, Some(2));
        assert_eq!(position.total_waitlisted, 2);
        assert_eq!(position.estimated_wait_days, 6);
        assert_eq!(position.status, "waitlisted");

        waitlist.promote("t1").await.unwrap();
        let offered = waitlist.position_for("u1", "t1").await.unwrap().unwrap();
        assert_eq!(offered.status, "spot_offered");
        assert_eq!(offered.position, None);
        assert!(offered.spot_expires_at.is_some());

        assert!(waitlist.position_for("u9", "t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_reflects_counter() {
        let (pool, _notifier, waitlist) = setup().await;
        seed_tournament(&pool, "open", None, 3).await;

        assert!(waitlist.capacity("t1").await.unwrap().is_full);
        assert!(!waitlist.capacity("open").await.unwrap().is_full);
        assert!(matches!(
            waitlist.capacity("missing").await.unwrap_err(),
            WaitlistError::NotFound(_)
        ));
    }
}
