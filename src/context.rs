/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    db,
    error::{WaitlistError, WaitlistResult},
    notify::{Mailer, NotificationService},
    waitlist::WaitlistManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    // In-app feed and email
    pub notifications: Arc<NotificationService>,
    // Waitlist engine
    pub waitlist: Arc<WaitlistManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> WaitlistResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;

        // Run migrations
        db::run_migrations(&db).await?;

        // Test connection
        db::test_connection(&db).await?;

        Self::with_pool(config, db)
    }

    /// Build the services on top of an already migrated pool
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> WaitlistResult<Self> {
        let mailer = Mailer::new(config.email.clone())?;
        if !mailer.is_configured() {
            tracing::info!("Email not configured - notifications stay in-app only");
        }

        let notifications = Arc::new(NotificationService::new(db.clone(), mailer));
        let waitlist = Arc::new(WaitlistManager::new(db.clone(), notifications.clone()));

        Ok(Self {
            config: Arc::new(config),
            db,
            notifications,
            waitlist,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> WaitlistResult<()> {
        let dir = &config.storage.data_directory;

        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                WaitlistError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_from_memory_pool() {
        let pool = db::create_memory_pool().await.unwrap();
        let config = ServerConfig::for_database("unused.sqlite".into());

        let ctx = AppContext::with_pool(config, pool).unwrap();
        assert_eq!(ctx.service_url(), "http://localhost:3080");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_database(dir.path().join("ctx.sqlite"));
        config.jobs.sweep_interval_secs = 0;

        assert!(matches!(
            AppContext::new(config).await,
            Err(WaitlistError::Validation(_))
        ));
    }
}
