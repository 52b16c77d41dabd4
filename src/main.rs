mod config;
mod desk;
mod discord;
mod entity;
mod scheduler;
mod store;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const OTP_VALIDITY_HOURS: i64 = 24;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::load()?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    let backup_dir = config.data_dir.join("backups");
    if let Err(e) = store::snapshot(
        &config.data_dir.join(store::DB_FILE),
        &backup_dir,
        scheduler::BACKUPS_KEPT,
    )
    .await
    {
        warn!("Startup backup failed: {}", e);
    }

    let store = store::Store::open(&config.data_dir).await?;
    let passwords = Arc::new(desk::OneTimePasswords::new(TimeDelta::hours(
        OTP_VALIDITY_HOURS,
    )));
    let desk = desk::SupportDesk::new(
        store.clone(),
        passwords.clone(),
        config.admin_password.clone(),
    );
    desk.seed_root_admin(config.level2_admin_id).await?;

    let maintenance = scheduler::Maintenance::new(store, passwords, backup_dir).await?;
    maintenance.start().await?;

    let bot = discord::Bot::new(config, desk);
    let bot_handle = tokio::spawn(async move {
        if let Err(e) = bot.start().await {
            tracing::error!("Discord bot error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = maintenance.shutdown().await {
        warn!("Failed to shutdown scheduler: {}", e);
    }

    bot_handle.abort();
    info!("Shutdown complete");

    Ok(())
}
