/// Notification dispatch
///
/// Waitlist transitions tell players what happened through an in-app
/// notification feed, mirrored to email when SMTP is configured. Delivery
/// is best-effort: the engine never lets a failed send undo a transition.

pub mod mailer;

pub use mailer::Mailer;

use crate::{
    db,
    error::{WaitlistError, WaitlistResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Notification categories emitted by the waitlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    WaitlistJoined,
    SpotOffered,
    SpotAccepted,
    SpotExpired,
    WaitlistPromoted,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::WaitlistJoined => "waitlist_joined",
            NotificationType::SpotOffered => "spot_offered",
            NotificationType::SpotAccepted => "spot_accepted",
            NotificationType::SpotExpired => "spot_expired",
            NotificationType::WaitlistPromoted => "waitlist_promoted",
        }
    }

    pub fn from_str(s: &str) -> WaitlistResult<Self> {
        match s {
            "waitlist_joined" => Ok(NotificationType::WaitlistJoined),
            "spot_offered" => Ok(NotificationType::SpotOffered),
            "spot_accepted" => Ok(NotificationType::SpotAccepted),
            "spot_expired" => Ok(NotificationType::SpotExpired),
            "waitlist_promoted" => Ok(NotificationType::WaitlistPromoted),
            _ => Err(WaitlistError::Validation(format!(
                "Invalid notification type: {}",
                s
            ))),
        }
    }
}

/// A message for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// Stored in-app notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNotification {
    pub id: String,
    #[serde(flatten)]
    pub notification: Notification,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Notification sender consumed by the waitlist engine
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification to its user
    async fn notify(&self, notification: Notification) -> WaitlistResult<()>;
}

/// In-app feed plus optional email
#[derive(Clone)]
pub struct NotificationService {
    db: SqlitePool,
    mailer: Mailer,
}

impl NotificationService {
    pub fn new(db: SqlitePool, mailer: Mailer) -> Self {
        Self { db, mailer }
    }

    /// Newest-first notifications for a user
    pub async fn list_for_user(&self, user_id: &str) -> WaitlistResult<Vec<StoredNotification>> {
        let rows: Vec<(String, String, String, String, String, String, bool, String)> =
            sqlx::query_as(
                r#"
                SELECT id, user_id, type, title, message, data, read, created_at
                FROM notifications
                WHERE user_id = ?1
                ORDER BY created_at DESC, rowid DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter()
            .map(
                |(id, user_id, kind, title, message, data, read, created_at)| {
                    Ok(StoredNotification {
                        id,
                        notification: Notification {
                            user_id,
                            kind: NotificationType::from_str(&kind)?,
                            title,
                            message,
                            data: serde_json::from_str(&data).map_err(|e| {
                                WaitlistError::Internal(format!("Invalid notification data: {}", e))
                            })?,
                        },
                        read,
                        created_at: db::parse_timestamp(&created_at)?,
                    })
                },
            )
            .collect()
    }

    async fn email_for(&self, user_id: &str) -> WaitlistResult<Option<String>> {
        let email: Option<Option<String>> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = ?1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(email.flatten())
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify(&self, notification: Notification) -> WaitlistResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, data, read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.data.to_string())
        .bind(db::format_timestamp(db::now()))
        .execute(&self.db)
        .await?;

        if self.mailer.is_configured() {
            if let Some(email) = self.email_for(&notification.user_id).await? {
                self.mailer
                    .send_email(&email, &notification.title, &notification.message)
                    .await?;
            }
        }

        Ok(())
    }
}
