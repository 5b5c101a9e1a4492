/// Courtline - waitlist promotion service
///
/// Serves the waitlist API and runs the periodic offer expiry sweep.

use courtline::{config::ServerConfig, jobs, server, AppContext, WaitlistResult};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> WaitlistResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(config.logging.env_filter()?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ______                  __  ___
  / ____/___  __  _______/ /_/ (_)___  ___
 / /   / __ \/ / / / ___/ __/ / / __ \/ _ \
/ /___/ /_/ / /_/ / /  / /_/ / / / / /  __/
\____/\____/\__,_/_/   \__/_/_/_/ /_/\___/

        Waitlist promotion service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
