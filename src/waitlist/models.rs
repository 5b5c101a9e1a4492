/// Waitlist model types
use crate::error::{WaitlistError, WaitlistResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event kinds with a waitlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Capacity-bounded bracket with explicit positions and a timed offer step
    Tournament,
    /// Season-scoped ladder; waitlist ranks are negative and promotion is immediate
    League,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Tournament => "tournament",
            EventKind::League => "league",
        }
    }

    /// Rough days per waitlist place
    pub fn wait_days_per_position(&self) -> i64 {
        match self {
            EventKind::Tournament => 3,
            EventKind::League => 7,
        }
    }
}

/// Tournament registration status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Waitlisted,
    SpotOffered,
    PendingPayment,
    Confirmed,
    Withdrawn,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Waitlisted => "waitlisted",
            RegistrationStatus::SpotOffered => "spot_offered",
            RegistrationStatus::PendingPayment => "pending_payment",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn from_str(s: &str) -> WaitlistResult<Self> {
        match s {
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            "spot_offered" => Ok(RegistrationStatus::SpotOffered),
            "pending_payment" => Ok(RegistrationStatus::PendingPayment),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "withdrawn" => Ok(RegistrationStatus::Withdrawn),
            _ => Err(WaitlistError::Internal(format!(
                "Invalid registration status: {}",
                s
            ))),
        }
    }
}

/// League participant status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Active,
    Withdrawn,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Active => "active",
            ParticipantStatus::Withdrawn => "withdrawn",
        }
    }
}

/// Result of joining a waitlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub entry_id: String,
    /// 1-based place in line
    pub position: i64,
}

/// Entry advanced by a promotion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub user_id: String,
    pub entry_id: String,
}

/// Outcome of accept, decline or leave; the message is shown to players verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferOutcome {
    pub success: bool,
    pub message: String,
}

impl OfferOutcome {
    pub fn success(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// A player's view of their place in line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistPosition {
    /// `None` while a spot offer is open
    pub position: Option<i64>,
    pub total_waitlisted: i64,
    pub estimated_wait_days: i64,
    pub status: String,
    pub spot_offered_at: Option<DateTime<Utc>>,
    pub spot_expires_at: Option<DateTime<Utc>>,
}

/// User attached to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Organizer view of one waitlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: String,
    pub position: Option<i64>,
    pub status: String,
    pub user: EntryUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_offered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_expires_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

/// Capacity snapshot used by the enrollment gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub is_full: bool,
    pub current_count: i64,
    /// `None` means unlimited
    pub max_count: Option<i64>,
}

impl Capacity {
    pub fn new(current_count: i64, max_count: Option<i64>) -> Self {
        Self {
            is_full: max_count.is_some_and(|max| current_count >= max),
            current_count,
            max_count,
        }
    }
}

/// Open spot offer on a tournament registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotOffer {
    pub registration_id: String,
    pub tournament_id: String,
    pub user_id: String,
    pub spot_expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        let kind: EventKind = serde_json::from_str("\"league\"").unwrap();
        assert_eq!(kind, EventKind::League);
        assert_eq!(serde_json::to_value(EventKind::Tournament).unwrap(), "tournament");
        assert!(serde_json::from_str::<EventKind>("\"ladder\"").is_err());
    }

    #[test]
    fn test_capacity_unlimited_is_never_full() {
        assert!(!Capacity::new(500, None).is_full);
        assert!(Capacity::new(16, Some(16)).is_full);
        assert!(!Capacity::new(15, Some(16)).is_full);
    }

    #[test]
    fn test_position_serializes_camel_case() {
        let position = WaitlistPosition {
            position: Some(2),
            total_waitlisted: 4,
            estimated_wait_days: 6,
            status: "waitlisted".to_string(),
            spot_offered_at: None,
            spot_expires_at: None,
        };
        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["totalWaitlisted"], 4);
        assert_eq!(json["estimatedWaitDays"], 6);
    }
}
