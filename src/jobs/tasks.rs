/// Background task implementations
use crate::{context::AppContext, error::WaitlistResult};

/// Expire lapsed tournament offers
pub async fn sweep_expired_offers(ctx: &AppContext) -> WaitlistResult<u64> {
    ctx.waitlist.sweep_expired_offers().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> WaitlistResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ServerConfig, waitlist::EventKind};
    use tempfile::TempDir;

    async fn context() -> (TempDir, AppContext) {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::for_database(dir.path().join("jobs.sqlite"));
        let ctx = AppContext::new(config).await.unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_health_check_passes() {
        let (_dir, ctx) = context().await;
        assert!(health_check(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_task_with_nothing_to_do() {
        let (_dir, ctx) = context().await;

        sqlx::query("INSERT INTO tournaments (id, name, max_participants) VALUES ('t1', 'Spring Open', 4)")
            .execute(&ctx.db)
            .await
            .unwrap();
        ctx.waitlist
            .enroll("u1", EventKind::Tournament, "t1", None)
            .await
            .unwrap();

        assert_eq!(sweep_expired_offers(&ctx).await.unwrap(), 0);
    }
}
