/// Health check endpoints for liveness and readiness probes
///
/// Supports two types of probes:
/// - Liveness: Is the application alive? (restart if not)
/// - Readiness: Can the application serve traffic? (remove from load balancer if not)

use crate::{context::AppContext, error::WaitlistResult, jobs};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,

    pub version: String,

    pub checks: Vec<ComponentHealth>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health status of individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    /// Status: "healthy", "degraded", or "unhealthy"
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health/detailed", get(health_detailed))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Liveness probe - if we can respond, we're alive
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe - 503 until the database answers
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = check_database(&ctx).await {
        tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Detailed health check with all component statuses
pub async fn health_detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let start = Instant::now();

    let checks = vec![
        check_database_detailed(&ctx).await,
        check_offer_sweep_detailed(&ctx).await,
    ];

    let overall_status = determine_overall_status(&checks);

    let health = HealthStatus {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
        message: if overall_status == "healthy" {
            None
        } else {
            Some("One or more components are unhealthy".to_string())
        },
    };

    let status_code = match overall_status.as_str() {
        "healthy" | "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    tracing::info!(
        status = %overall_status,
        duration_ms = start.elapsed().as_millis(),
        "health_check_completed"
    );

    (status_code, Json(health))
}

async fn check_database(ctx: &AppContext) -> WaitlistResult<()> {
    jobs::tasks::health_check(ctx).await
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match check_database(ctx).await {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
            details: Some(serde_json::json!({
                "type": "sqlite",
                "pool_size": ctx.db.size(),
            })),
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: Some(e.to_string()),
            details: None,
        },
    }
}

/// Count offers already past their deadline; a backlog means nothing is sweeping
async fn check_offer_sweep_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    let overdue: Result<i64, sqlx::Error> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tournament_registrations WHERE status = 'spot_offered' AND spot_expires_at < ?1",
    )
    .bind(crate::db::format_timestamp(crate::db::now()))
    .fetch_one(&ctx.db)
    .await;

    match overdue {
        Ok(overdue) => ComponentHealth {
            name: "offer_sweep".to_string(),
            // Lapsed offers waiting for a sweep degrade, they do not stop traffic
            status: if overdue == 0 { "healthy" } else { "degraded" }.to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
            details: Some(serde_json::json!({
                "in_process": ctx.config.jobs.sweep_enabled,
                "interval_secs": ctx.config.jobs.sweep_interval_secs,
                "overdue_offers": overdue,
            })),
        },
        Err(e) => ComponentHealth {
            name: "offer_sweep".to_string(),
            status: "degraded".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: Some(e.to_string()),
            details: None,
        },
    }
}

/// Determine overall health status from individual checks
fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    let unhealthy_count = checks.iter().filter(|c| c.status == "unhealthy").count();
    let degraded_count = checks.iter().filter(|c| c.status == "degraded").count();

    if unhealthy_count > 0 {
        "unhealthy".to_string()
    } else if degraded_count > 0 {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, status: &str) -> ComponentHealth {
        ComponentHealth {
            name: name.to_string(),
            status: status.to_string(),
            response_time_ms: Some(4),
            error: None,
            details: None,
        }
    }

    #[test]
    fn test_determine_overall_status() {
        assert_eq!(
            determine_overall_status(&[component("database", "healthy"), component("offer_sweep", "healthy")]),
            "healthy"
        );
        assert_eq!(
            determine_overall_status(&[component("database", "healthy"), component("offer_sweep", "degraded")]),
            "degraded"
        );
        assert_eq!(
            determine_overall_status(&[component("database", "unhealthy"), component("offer_sweep", "degraded")]),
            "unhealthy"
        );
    }

    #[tokio::test]
    async fn test_detailed_reports_overdue_offers() {
        let pool = crate::db::create_memory_pool().await.unwrap();
        let config = crate::config::ServerConfig::for_database("unused.sqlite".into());
        let ctx = AppContext::with_pool(config, pool).unwrap();

        let (status, Json(health)) = health_detailed(State(ctx.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.checks.len(), 2);

        sqlx::query(
            "INSERT INTO tournaments (id, name, max_participants, current_participants) VALUES ('t1', 'Dink Open', 4, 4)",
        )
        .execute(&ctx.db)
        .await
        .unwrap();
        ctx.waitlist
            .enroll("u1", crate::waitlist::EventKind::Tournament, "t1", None)
            .await
            .unwrap();
        ctx.waitlist
            .promote(crate::waitlist::EventKind::Tournament, "t1")
            .await
            .unwrap();

        let offered_at = crate::db::now() - chrono::Duration::hours(30);
        sqlx::query(
            "UPDATE tournament_registrations SET spot_offered_at = ?1, spot_expires_at = ?2 WHERE status = 'spot_offered'",
        )
        .bind(crate::db::format_timestamp(offered_at))
        .bind(crate::db::format_timestamp(offered_at + chrono::Duration::hours(24)))
        .execute(&ctx.db)
        .await
        .unwrap();

        let (status, Json(health)) = health_detailed(State(ctx)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "degraded");

        let sweep = health
            .checks
            .iter()
            .find(|c| c.name == "offer_sweep")
            .unwrap();
        assert_eq!(sweep.status, "degraded");
        assert_eq!(sweep.details.as_ref().unwrap()["overdue_offers"], 1);
    }
}
