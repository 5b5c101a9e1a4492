/// Waitlist API Endpoints
/// Thin JSON wrappers over the waitlist engine
use crate::{
    error::{WaitlistError, WaitlistResult},
    notify::StoredNotification,
    waitlist::{
        Capacity, Enrollment, EventKind, OfferOutcome, Promotion, WaitlistEntry,
        WaitlistPosition, MSG_NOT_ON_WAITLIST,
    },
    AppContext,
};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build waitlist API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        // Player actions
        .route("/api/waitlist/join", post(join))
        .route("/api/waitlist/leave", post(leave))
        .route("/api/waitlist/position", get(position))
        .route("/api/waitlist/accept", post(accept))
        .route("/api/waitlist/decline", post(decline))
        .route("/api/notifications", get(notifications))
        // Organizer views and actions
        .route("/api/waitlist/entries", get(entries))
        .route("/api/waitlist/capacity", get(capacity))
        .route("/api/waitlist/promote", post(promote))
        // Periodic trigger
        .route("/api/waitlist/sweep", post(sweep))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    user_id: String,
    event_kind: EventKind,
    event_id: String,
    subgroup_id: Option<String>,
}

/// Join a full event's waitlist
async fn join(
    State(ctx): State<AppContext>,
    Json(req): Json<JoinRequest>,
) -> WaitlistResult<Json<Enrollment>> {
    let capacity = ctx.waitlist.is_event_full(req.event_kind, &req.event_id).await?;
    if !capacity.is_full {
        return Err(WaitlistError::Validation(
            "Event has open spots; register directly instead of joining the waitlist".to_string(),
        ));
    }

    let enrollment = ctx
        .waitlist
        .enroll(
            &req.user_id,
            req.event_kind,
            &req.event_id,
            req.subgroup_id.as_deref(),
        )
        .await?;

    Ok(Json(enrollment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEventRequest {
    user_id: String,
    event_kind: EventKind,
    event_id: String,
}

fn outcome_response(outcome: OfferOutcome) -> (StatusCode, Json<OfferOutcome>) {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome))
}

/// Leave a waitlist
async fn leave(
    State(ctx): State<AppContext>,
    Json(req): Json<UserEventRequest>,
) -> WaitlistResult<(StatusCode, Json<OfferOutcome>)> {
    let outcome = ctx
        .waitlist
        .leave(&req.user_id, req.event_kind, &req.event_id)
        .await?;
    Ok(outcome_response(outcome))
}

/// Accept an offered tournament spot
async fn accept(
    State(ctx): State<AppContext>,
    Json(req): Json<UserEventRequest>,
) -> WaitlistResult<(StatusCode, Json<OfferOutcome>)> {
    let outcome = ctx
        .waitlist
        .accept(&req.user_id, req.event_kind, &req.event_id)
        .await?;
    Ok(outcome_response(outcome))
}

/// Decline an offered tournament spot
async fn decline(
    State(ctx): State<AppContext>,
    Json(req): Json<UserEventRequest>,
) -> WaitlistResult<(StatusCode, Json<OfferOutcome>)> {
    let outcome = ctx
        .waitlist
        .decline(&req.user_id, req.event_kind, &req.event_id)
        .await?;
    Ok(outcome_response(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserEventQuery {
    user_id: String,
    event_kind: EventKind,
    event_id: String,
}

/// The caller's place in line
async fn position(
    State(ctx): State<AppContext>,
    Query(query): Query<UserEventQuery>,
) -> WaitlistResult<Json<WaitlistPosition>> {
    ctx.waitlist
        .get_position(&query.user_id, query.event_kind, &query.event_id)
        .await?
        .map(Json)
        .ok_or_else(|| WaitlistError::NotFound(MSG_NOT_ON_WAITLIST.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventQuery {
    event_kind: EventKind,
    event_id: String,
}

#[derive(Debug, Serialize)]
struct EntriesResponse {
    entries: Vec<WaitlistEntry>,
}

/// Everyone in line for an event
async fn entries(
    State(ctx): State<AppContext>,
    Query(query): Query<EventQuery>,
) -> WaitlistResult<Json<EntriesResponse>> {
    let entries = ctx
        .waitlist
        .list_entries(query.event_kind, &query.event_id)
        .await?;
    Ok(Json(EntriesResponse { entries }))
}

/// Confirmed participants against the limit
async fn capacity(
    State(ctx): State<AppContext>,
    Query(query): Query<EventQuery>,
) -> WaitlistResult<Json<Capacity>> {
    let capacity = ctx
        .waitlist
        .is_event_full(query.event_kind, &query.event_id)
        .await?;
    Ok(Json(capacity))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromoteRequest {
    event_kind: EventKind,
    event_id: String,
}

#[derive(Debug, Serialize)]
struct PromoteResponse {
    promotion: Option<Promotion>,
}

/// Promote the head of the line after a spot frees up
async fn promote(
    State(ctx): State<AppContext>,
    Json(req): Json<PromoteRequest>,
) -> WaitlistResult<Json<PromoteResponse>> {
    let promotion = ctx.waitlist.promote(req.event_kind, &req.event_id).await?;
    Ok(Json(PromoteResponse { promotion }))
}

#[derive(Debug, Serialize)]
struct SweepResponse {
    expired: u64,
}

/// Expire lapsed offers; guarded by the cron token when one is configured
async fn sweep(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> WaitlistResult<Json<SweepResponse>> {
    if let Some(expected) = ctx.config.service.cron_token.as_deref() {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        if presented != Some(expected) {
            tracing::warn!("Rejected sweep request with missing or invalid cron token");
            return Err(WaitlistError::Authorization(
                "Invalid cron token".to_string(),
            ));
        }
    }

    let expired = ctx.waitlist.sweep_expired_offers().await?;
    Ok(Json(SweepResponse { expired }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationsQuery {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct NotificationsResponse {
    notifications: Vec<StoredNotification>,
}

/// A user's in-app notification feed
async fn notifications(
    State(ctx): State<AppContext>,
    Query(query): Query<NotificationsQuery>,
) -> WaitlistResult<Json<NotificationsResponse>> {
    let notifications = ctx.notifications.list_for_user(&query.user_id).await?;
    Ok(Json(NotificationsResponse { notifications }))
}
