use crate::desk::OneTimePasswords;
use crate::store::{self, Store};
use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use iana_time_zone::get_timezone;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

pub const BACKUPS_KEPT: usize = 5;
const PURGE_CRON: &str = "0 0 * * * *";
const BACKUP_CRON: &str = "0 0 3 * * *";

/// Periodic housekeeping: expiring one-time passwords and nightly backups.
pub struct Maintenance {
    scheduler: Mutex<JobScheduler>,
    store: Arc<Store>,
    passwords: Arc<OneTimePasswords>,
    backup_dir: PathBuf,
}

impl Maintenance {
    pub async fn new(
        store: Arc<Store>,
        passwords: Arc<OneTimePasswords>,
        backup_dir: PathBuf,
    ) -> Result<Arc<Self>> {
        let scheduler = JobScheduler::new().await?;
        Ok(Arc::new(Self {
            scheduler: Mutex::new(scheduler),
            store,
            passwords,
            backup_dir,
        }))
    }

    pub async fn start(&self) -> Result<()> {
        let timezone = local_timezone();
        let scheduler = self.scheduler.lock().await;

        let passwords = self.passwords.clone();
        scheduler
            .add(Job::new_async_tz(PURGE_CRON, timezone, move |_uuid, _l| {
                let passwords = passwords.clone();
                Box::pin(async move {
                    let purged = passwords.purge_expired(Utc::now()).await;
                    if purged > 0 {
                        info!("Purged {} expired one-time passwords", purged);
                    }
                })
            })?)
            .await?;

        let store = self.store.clone();
        let backup_dir = self.backup_dir.clone();
        scheduler
            .add(Job::new_async_tz(BACKUP_CRON, timezone, move |_uuid, _l| {
                let store = store.clone();
                let backup_dir = backup_dir.clone();
                Box::pin(async move {
                    if let Err(e) =
                        store::snapshot(store.db_path(), &backup_dir, BACKUPS_KEPT).await
                    {
                        error!("Scheduled backup failed: {}", e);
                    }
                })
            })?)
            .await?;

        scheduler.start().await?;
        info!("Maintenance scheduler started ({})", timezone);
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        info!("Maintenance scheduler shut down");
        Ok(())
    }
}

fn local_timezone() -> Tz {
    match get_timezone().map(|name| name.parse::<Tz>()) {
        Ok(Ok(tz)) => tz,
        Ok(Err(e)) => {
            warn!("Unknown local timezone, using UTC: {}", e);
            Tz::UTC
        }
        Err(e) => {
            warn!("Could not detect local timezone, using UTC: {}", e);
            Tz::UTC
        }
    }
}
