use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use watchtower_bot::alert::{AlertStyle, WebhookDispatcher};
use watchtower_bot::config::Config;
use watchtower_bot::create_app;
use watchtower_bot::scanner::Scanner;
use watchtower_bot::session::{MinecraftConnector, SessionManager, SessionTiming};
use watchtower_bot::status::BotStatus;
use watchtower_proto::ClientOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = "debug";
    #[cfg(not(debug_assertions))]
    let log_level = "info";

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting Watchtower bot...");

    // Load configuration from environment variables or use defaults
    let config = Config::from_env();
    tracing::info!(
        "Configuration: server={}:{}, username={}, status_port={}, radius={} blocks",
        config.minecraft_host,
        config.minecraft_port,
        config.bot_username,
        config.port,
        config.detection_radius()
    );
    tracing::info!(
        "Timing: check every {}ms, cooldown {}ms, reconnect after {}ms, session timeout {}ms, whitelist={:?}",
        config.check_interval.as_millis(),
        config.notification_cooldown.as_millis(),
        config.reconnect_delay.as_millis(),
        config.session_timeout.as_millis(),
        config.whitelist
    );

    let status = Arc::new(BotStatus::new());
    let app = create_app(status.clone(), config.request_timeout);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding status server on {addr}"))?;
    tracing::info!("Health check server running on {}", addr);

    let dispatcher = WebhookDispatcher::new(
        &config.webhook_url,
        config.webhook_timeout,
        AlertStyle {
            title: config.alert_title.clone(),
            footer: config.alert_footer.clone(),
        },
        status.clone(),
    )
    .context("building webhook client")?;
    let scanner = Scanner::new(
        config.whitelist.clone(),
        config.detection_radius(),
        config.notification_cooldown,
        dispatcher,
        status.clone(),
    );
    let connector = MinecraftConnector::new(ClientOptions {
        host: config.minecraft_host.clone(),
        port: config.minecraft_port,
        username: config.bot_username.clone(),
        login_timeout: config.session_timeout,
    });
    let manager = SessionManager::new(
        connector,
        scanner,
        status,
        SessionTiming {
            check_interval: config.check_interval,
            reconnect_delay: config.reconnect_delay,
            idle_timeout: config.session_timeout,
        },
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        _ = manager.run() => {}
    }
    Ok(())
}
