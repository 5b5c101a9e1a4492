/// League waitlist
///
/// League participants live in a season. Confirmed standing uses positive
/// ranks and the waitlist uses negative ones: `-1` is first in line, `-2`
/// second, and so on. Promotion hands out the next positive rank directly,
/// there is no offer step.
use super::{
    is_slot_contention, notify_best_effort, Capacity, Enrollment, EntryUser, EventKind,
    ParticipantStatus, Promotion, WaitlistBackend, WaitlistEntry, WaitlistPosition,
    ENROLL_ATTEMPTS, PROMOTE_ATTEMPTS,
};
use crate::{
    db,
    error::{WaitlistError, WaitlistResult},
    metrics,
    notify::{Notification, NotificationType, Notifier},
};
use async_trait::async_trait;
use serde_json::json;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// League waitlist backend
#[derive(Clone)]
pub struct LeagueWaitlist {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
}

impl LeagueWaitlist {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    async fn league(&self, league_id: &str) -> WaitlistResult<(String, Option<i64>)> {
        let row: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT name, max_participants FROM leagues WHERE id = ?1")
                .bind(league_id)
                .fetch_optional(&self.db)
                .await?;

        row.ok_or_else(|| WaitlistError::NotFound(format!("League {} not found", league_id)))
    }

    /// Most recent season of a league
    async fn latest_season(&self, league_id: &str) -> WaitlistResult<Option<String>> {
        let season = sqlx::query_scalar(
            r#"
            SELECT id FROM league_seasons
            WHERE league_id = ?1
            ORDER BY season_number DESC
            LIMIT 1
            "#,
        )
        .bind(league_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(season)
    }

    /// Season a new entrant joins: the latest one.
    ///
    /// Promotion, position and withdraw only look at the latest season, so an
    /// explicit older season is refused rather than stranding the entry.
    async fn resolve_season(
        &self,
        league_id: &str,
        season_id: Option<&str>,
    ) -> WaitlistResult<String> {
        let latest = self.latest_season(league_id).await?.ok_or_else(|| {
            WaitlistError::NotFound(format!("No season found for league {}", league_id))
        })?;

        let Some(requested) = season_id else {
            return Ok(latest);
        };
        if requested == latest {
            return Ok(latest);
        }

        let known: Option<String> = sqlx::query_scalar(
            "SELECT id FROM league_seasons WHERE id = ?1 AND league_id = ?2",
        )
        .bind(requested)
        .bind(league_id)
        .fetch_optional(&self.db)
        .await?;

        match known {
            Some(_) => Err(WaitlistError::Validation(format!(
                "Season {} of league {} is closed to new entrants, season {} is current",
                requested, league_id, latest
            ))),
            None => Err(WaitlistError::NotFound(format!(
                "Season {} not found for league {}",
                requested, league_id
            ))),
        }
    }

    async fn allocate_rank(conn: &mut SqliteConnection, season_id: &str) -> WaitlistResult<i64> {
        let existing_min: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MIN(rank) FROM league_participants
            WHERE season_id = ?1 AND rank < 0 AND status = 'active'
            "#,
        )
        .bind(season_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(existing_min.map_or(-1, |min| (min - 1).min(-1)))
    }

    async fn try_enroll(&self, user_id: &str, season_id: &str) -> WaitlistResult<Enrollment> {
        let mut tx = db::begin_immediate(&self.db).await?;

        let rank = Self::allocate_rank(&mut tx, season_id).await?;
        let participant_id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO league_participants (id, season_id, rank, status, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&participant_id)
        .bind(season_id)
        .bind(rank)
        .bind(ParticipantStatus::Active.as_str())
        .bind(db::format_timestamp(db::now()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO league_participant_players (participant_id, user_id) VALUES (?1, ?2)",
        )
        .bind(&participant_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Enrollment {
            entry_id: participant_id,
            position: rank.abs(),
        })
    }

    /// Give a waitlisted participant the next positive rank; `None` if it already moved
    async fn grant(&self, participant_id: &str, season_id: &str, rank: i64) -> WaitlistResult<Option<i64>> {
        let mut tx = db::begin_immediate(&self.db).await?;

        let next_rank: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(rank), 0) + 1 FROM league_participants
            WHERE season_id = ?1 AND rank > 0
            "#,
        )
        .bind(season_id)
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE league_participants SET rank = ?1 WHERE id = ?2 AND rank = ?3 AND status = 'active'",
        )
        .bind(next_rank)
        .bind(participant_id)
        .bind(rank)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(next_rank))
    }
}

#[async_trait]
impl WaitlistBackend for LeagueWaitlist {
    fn kind(&self) -> EventKind {
        EventKind::League
    }

    async fn next_position(
        &self,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<i64> {
        let season_id = self.resolve_season(event_id, subgroup_id).await?;
        let mut conn = self.db.acquire().await?;
        Self::allocate_rank(&mut conn, &season_id).await
    }

    async fn enroll(
        &self,
        user_id: &str,
        event_id: &str,
        subgroup_id: Option<&str>,
    ) -> WaitlistResult<Enrollment> {
        let (name, _) = self.league(event_id).await?;
        let season_id = self.resolve_season(event_id, subgroup_id).await?;

        let mut attempt = 1;
        let enrollment = loop {
            match self.try_enroll(user_id, &season_id).await {
                Ok(enrollment) => break enrollment,
                Err(e) if is_slot_contention(&e) && attempt < ENROLL_ATTEMPTS => {
                    tracing::warn!(
                        "Waitlist rank for season {} taken concurrently, retrying (attempt {})",
                        season_id,
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
            "User {} joined waitlist for league {} season {} at rank -{}",
            user_id,
            event_id,
            season_id,
            enrollment.position
        );
        metrics::record_transition(EventKind::League.as_str(), "enrolled");

        notify_best_effort(
            self.notifier.as_ref(),
            Notification {
                user_id: user_id.to_string(),
                kind: NotificationType::WaitlistJoined,
                title: "You're on the waitlist".to_string(),
                message: format!(
                    "You are #{} on the waitlist for {}. We'll let you know when a spot opens up.",
                    enrollment.position, name
                ),
                data: json!({
                    "leagueId": event_id,
                    "seasonId": season_id,
                    "participantId": enrollment.entry_id,
                    "position": enrollment.position,
                }),
            },
        )
        .await;

        Ok(enrollment)
    }

    async fn promote(&self, event_id: &str) -> WaitlistResult<Option<Promotion>> {
        let Some(season_id) = self.latest_season(event_id).await? else {
            tracing::debug!("League {} has no season, nothing to promote", event_id);
            return Ok(None);
        };

        for _ in 0..PROMOTE_ATTEMPTS {
            let next = sqlx::query(
                r#"
                SELECT lp.id, lp.rank, pp.user_id
                FROM league_participants lp
                JOIN league_participant_players pp ON pp.participant_id = lp.id
                WHERE lp.season_id = ?1 AND lp.rank < 0 AND lp.status = 'active'
                ORDER BY lp.rank DESC
                LIMIT 1
                "#,
            )
            .bind(&season_id)
            .fetch_optional(&self.db)
            .await?;

            let Some(row) = next else {
                tracing::debug!("No waitlisted participants to promote for league {}", event_id);
                return Ok(None);
            };

            let participant_id: String = row.try_get("id")?;
            let rank: i64 = row.try_get("rank")?;
            let user_id: String = row.try_get("user_id")?;

            let Some(new_rank) = self.grant(&participant_id, &season_id, rank).await? else {
                continue;
            };

            tracing::info!(
                "Promoted user {} in league {} from rank {} to rank {}",
                user_id,
                event_id,
                rank,
                new_rank
            );
            metrics::record_transition(EventKind::League.as_str(), "promoted");

            let name = self
                .league(event_id)
                .await
                .map(|(name, _)| name)
                .unwrap_or_else(|_| "the league".to_string());

            notify_best_effort(
                self.notifier.as_ref(),
                Notification {
                    user_id: user_id.clone(),
                    kind: NotificationType::WaitlistPromoted,
                    title: "You're in!".to_string(),
                    message: format!(
                        "A spot opened up in {} and it's yours. You are now ranked #{}.",
                        name, new_rank
                    ),
                    data: json!({
                        "leagueId": event_id,
                        "seasonId": season_id,
                        "participantId": participant_id,
                        "rank": new_rank,
                    }),
                },
            )
            .await;

            return Ok(Some(Promotion {
                user_id,
                entry_id: participant_id,
            }));
        }

        Err(WaitlistError::Conflict(format!(
            "Waitlist for league {} changed during promotion, please retry",
            event_id
        )))
    }

    async fn reorder(&self, event_id: &str) -> WaitlistResult<()> {
        // Negative ranks stay totally ordered across gaps and promotion searches for the head
        tracing::debug!("League {} waitlist needs no reordering", event_id);
        Ok(())
    }

    async fn position_for(
        &self,
        user_id: &str,
        event_id: &str,
    ) -> WaitlistResult<Option<WaitlistPosition>> {
        let Some(season_id) = self.latest_season(event_id).await? else {
            return Ok(None);
        };

        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            SELECT lp.rank, lp.status
            FROM league_participants lp
            JOIN league_participant_players pp ON pp.participant_id = lp.id
            WHERE lp.season_id = ?1
              AND pp.user_id = ?2
              AND lp.rank < 0
              AND lp.status = 'active'
            LIMIT 1
            "#,
        )
        .bind(&season_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let Some((rank, status)) = row else {
            return Ok(None);
        };

        let (position, total_waitlisted): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN rank >= ?2 THEN 1 ELSE 0 END), 0),
                COUNT(*)
            FROM league_participants
            WHERE season_id = ?1 AND rank < 0 AND status = 'active'
            "#,
        )
        .bind(&season_id)
        .bind(rank)
        .fetch_one(&self.db)
        .await?;

        Ok(Some(WaitlistPosition {
            position: Some(position),
            total_waitlisted,
            estimated_wait_days: position * EventKind::League.wait_days_per_position(),
            status,
            spot_offered_at: None,
            spot_expires_at: None,
        }))
    }

    async fn list_entries(&self, event_id: &str) -> WaitlistResult<Vec<WaitlistEntry>> {
        let Some(season_id) = self.latest_season(event_id).await? else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT lp.id, lp.status, lp.joined_at, pp.user_id, u.display_name
            FROM league_participants lp
            JOIN league_participant_players pp ON pp.participant_id = lp.id
            LEFT JOIN users u ON u.id = pp.user_id
            WHERE lp.season_id = ?1 AND lp.rank < 0 AND lp.status = 'active'
            ORDER BY lp.rank DESC
            "#,
        )
        .bind(&season_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .zip(1_i64..)
            .map(|(row, position)| {
                let joined_at: String = row.try_get("joined_at")?;
                Ok(WaitlistEntry {
                    id: row.try_get("id")?,
                    position: Some(position),
                    status: row.try_get("status")?,
                    user: EntryUser {
                        id: row.try_get("user_id")?,
                        display_name: row.try_get("display_name")?,
                    },
                    spot_offered_at: None,
                    spot_expires_at: None,
                    registered_at: db::parse_timestamp(&joined_at)?,
                })
            })
            .collect()
    }

    async fn capacity(&self, event_id: &str) -> WaitlistResult<Capacity> {
        let (_, max) = self.league(event_id).await?;

        let current = match self.latest_season(event_id).await? {
            Some(season_id) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM league_participants
                    WHERE season_id = ?1 AND rank > 0 AND status = 'active'
                    "#,
                )
                .bind(&season_id)
                .fetch_one(&self.db)
                .await?
            }
            None => 0,
        };

        Ok(Capacity::new(current, max))
    }

    async fn withdraw(&self, user_id: &str, event_id: &str) -> WaitlistResult<bool> {
        let Some(season_id) = self.latest_season(event_id).await? else {
            return Ok(false);
        };

        let result = sqlx::query(
            r#"
            UPDATE league_participants
            SET status = 'withdrawn'
            WHERE season_id = ?1
              AND rank < 0
              AND status = 'active'
              AND id IN (SELECT participant_id FROM league_participant_players WHERE user_id = ?2)
            "#,
        )
        .bind(&season_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        tracing::info!("User {} left waitlist for league {}", user_id, event_id);
        metrics::record_transition(EventKind::League.as_str(), "left");

        Ok(true)
    }
}
