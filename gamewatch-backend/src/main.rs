use anyhow::Context;
use gamewatch_backend::config::Config;
use gamewatch_backend::create_app;
use gamewatch_backend::dispatch::Dispatcher;
use gamewatch_backend::outbound::HttpOutbound;
use gamewatch_db::Database;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Gamewatch backend server...");

    let config = Config::from_env();
    tracing::info!(
        "Configuration: port={}, db_path={}, body_limit={}KB, timeout={}s",
        config.port,
        config.database_path,
        config.request_body_limit / 1024,
        config.request_timeout.as_secs(),
    );

    let webhook_url = config
        .discord_webhook_url
        .clone()
        .context("DISCORD_WEBHOOK environment variable is required")?;
    let account_sid = config
        .twilio_account_sid
        .clone()
        .context("TWILIO_ACCT_SID environment variable is required")?;
    let auth_token = config
        .twilio_auth_token
        .clone()
        .context("TWILIO_AUTH_TOKEN environment variable is required")?;
    let from_number = config
        .twilio_from_number
        .clone()
        .context("TWILIO_TN environment variable is required")?;

    let db = Database::open(&config.database_path)
        .await
        .context("opening database")?;

    let outbound = HttpOutbound::new(
        webhook_url,
        account_sid,
        auth_token,
        from_number,
        config.delivery_timeout,
    )
    .context("building outbound client")?;
    let dispatcher = Dispatcher::new(db.clone(), Arc::new(outbound));

    let app = create_app(
        db,
        dispatcher,
        config.request_body_limit,
        config.request_timeout,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
