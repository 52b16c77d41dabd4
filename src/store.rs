use crate::entity::{admins, dialogues, messages};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

mod backup;
mod records;

pub use backup::snapshot;
pub use records::{
    AccessLevel, Admin, AdminStats, Dialogue, DialogueStatus, Message, NewAdmin, Overview,
};

pub const DB_FILE: &str = "support_relay.db";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite-backed storage for admins, dialogues and the message log.
///
/// Every call opens its own connection on the blocking pool, so no state is
/// cached between calls and every decision reads the current rows.
pub struct Store {
    db_url: String,
    db_path: PathBuf,
}

impl Store {
    pub async fn open(data_dir: &Path) -> StoreResult<Arc<Self>> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join(DB_FILE);
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let store = Self { db_url, db_path };
        store
            .call(|db| {
                db.get_schema_builder()
                    .register(admins::Entity)
                    .register(dialogues::Entity)
                    .register(messages::Entity)
                    .apply(db)?;
                Ok(())
            })
            .await?;

        info!("Store ready at {}", store.db_path.display());
        Ok(Arc::new(store))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DatabaseConnection) -> StoreResult<T> + Send + 'static,
    {
        let db_url = self.db_url.clone();
        tokio::task::spawn_blocking(move || {
            let db = Database::connect(&db_url)?;
            db.execute_unprepared("PRAGMA foreign_keys = ON")?;
            f(&db)
        })
        .await?
    }

    pub async fn find_admin(&self, user_id: i64) -> StoreResult<Option<Admin>> {
        self.call(move |db| {
            admins::Entity::find()
                .filter(admins::Column::UserId.eq(user_id))
                .one(db)?
                .map(Admin::try_from)
                .transpose()
        })
        .await
    }

    pub async fn find_admin_by_tag(&self, tag: &str) -> StoreResult<Option<Admin>> {
        let admins = self.list_admins().await?;
        Ok(admins.into_iter().find(|a| a.tag.eq_ignore_ascii_case(tag)))
    }

    pub async fn list_admins(&self) -> StoreResult<Vec<Admin>> {
        self.call(|db| {
            admins::Entity::find()
                .order_by_asc(admins::Column::Id)
                .all(db)?
                .into_iter()
                .map(Admin::try_from)
                .collect()
        })
        .await
    }

    pub async fn insert_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let record = admins::ActiveModel {
            id: NotSet,
            user_id: Set(admin.user_id),
            tag: Set(admin.tag),
            level: Set(admin.level.as_i32()),
            password: Set(admin.password_hash),
            active: Set(true),
        };

        let admin = self
            .call(move |db| Admin::try_from(record.insert(db)?))
            .await?;
        info!(
            "Registered admin {} as #{} ({})",
            admin.user_id, admin.tag, admin.level
        );
        Ok(admin)
    }

    pub async fn set_admin_tag(&self, user_id: i64, tag: &str) -> StoreResult<bool> {
        self.update_admin(user_id, admins::Column::Tag, tag.into())
            .await
    }

    pub async fn set_admin_level(&self, user_id: i64, level: AccessLevel) -> StoreResult<bool> {
        self.update_admin(user_id, admins::Column::Level, level.as_i32().into())
            .await
    }

    pub async fn set_admin_active(&self, user_id: i64, active: bool) -> StoreResult<bool> {
        self.update_admin(user_id, admins::Column::Active, active.into())
            .await
    }

    async fn update_admin(
        &self,
        user_id: i64,
        column: admins::Column,
        value: Value,
    ) -> StoreResult<bool> {
        self.call(move |db| {
            let result = admins::Entity::update_many()
                .col_expr(column, Expr::value(value))
                .filter(admins::Column::UserId.eq(user_id))
                .exec(db)?;
            Ok(result.rows_affected > 0)
        })
        .await
    }

    pub async fn get_dialogue(&self, id: i64) -> StoreResult<Option<Dialogue>> {
        self.call(move |db| {
            dialogues::Entity::find_by_id(id)
                .one(db)?
                .map(Dialogue::try_from)
                .transpose()
        })
        .await
    }

    /// The client's open or assigned dialogue, if any.
    pub async fn live_dialogue_for_client(&self, client_id: i64) -> StoreResult<Option<Dialogue>> {
        self.call(move |db| live_dialogue(db, client_id)).await
    }

    pub async fn assigned_dialogue_for_admin(&self, admin_id: i64) -> StoreResult<Option<Dialogue>> {
        self.call(move |db| {
            dialogues::Entity::find()
                .filter(dialogues::Column::AdminId.eq(admin_id))
                .filter(dialogues::Column::Status.eq(DialogueStatus::Assigned.as_str()))
                .order_by_desc(dialogues::Column::Id)
                .one(db)?
                .map(Dialogue::try_from)
                .transpose()
        })
        .await
    }

    /// Returns the client's live dialogue, creating one in `open` status when
    /// none exists. The boolean is true when a row was created.
    pub async fn open_or_create_dialogue(
        &self,
        client_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<(Dialogue, bool)> {
        let (dialogue, created) = self
            .call(move |db| {
                let txn = db.begin()?;
                if let Some(existing) = live_dialogue(&txn, client_id)? {
                    txn.commit()?;
                    return Ok((existing, false));
                }

                let record = dialogues::ActiveModel {
                    id: NotSet,
                    client_id: Set(client_id),
                    admin_id: Set(None),
                    status: Set(DialogueStatus::Open.as_str().to_string()),
                    start_time: Set(now.timestamp_micros()),
                    end_time: Set(None),
                };
                let model = record.insert(&txn)?;
                txn.commit()?;
                Ok((Dialogue::try_from(model)?, true))
            })
            .await?;

        if created {
            info!("Opened dialogue {} for client {}", dialogue.id, client_id);
        }
        Ok((dialogue, created))
    }

    /// Assigns a live dialogue to an admin. Returns false if the dialogue is
    /// missing or already closed.
    pub async fn assign_dialogue(&self, dialogue_id: i64, admin_id: i64) -> StoreResult<bool> {
        let assigned = self
            .call(move |db| {
                let result = dialogues::Entity::update_many()
                    .col_expr(dialogues::Column::AdminId, Expr::value(admin_id))
                    .col_expr(
                        dialogues::Column::Status,
                        Expr::value(DialogueStatus::Assigned.as_str()),
                    )
                    .filter(dialogues::Column::Id.eq(dialogue_id))
                    .filter(dialogues::Column::Status.is_in(DialogueStatus::LIVE))
                    .exec(db)?;
                Ok(result.rows_affected > 0)
            })
            .await?;

        if assigned {
            info!("Dialogue {} assigned to admin {}", dialogue_id, admin_id);
        }
        Ok(assigned)
    }

    pub async fn close_dialogue(&self, dialogue_id: i64, now: DateTime<Utc>) -> StoreResult<bool> {
        let closed = self
            .call(move |db| {
                let result = dialogues::Entity::update_many()
                    .col_expr(
                        dialogues::Column::Status,
                        Expr::value(DialogueStatus::Closed.as_str()),
                    )
                    .col_expr(dialogues::Column::EndTime, Expr::value(now.timestamp_micros()))
                    .filter(dialogues::Column::Id.eq(dialogue_id))
                    .filter(dialogues::Column::Status.is_in(DialogueStatus::LIVE))
                    .exec(db)?;
                Ok(result.rows_affected > 0)
            })
            .await?;

        if closed {
            info!("Closed dialogue {}", dialogue_id);
        }
        Ok(closed)
    }

    pub async fn dialogues_for_client(&self, client_id: i64) -> StoreResult<Vec<Dialogue>> {
        self.call(move |db| {
            dialogues::Entity::find()
                .filter(dialogues::Column::ClientId.eq(client_id))
                .order_by_asc(dialogues::Column::Id)
                .all(db)?
                .into_iter()
                .map(Dialogue::try_from)
                .collect()
        })
        .await
    }

    pub async fn assigned_dialogues(&self) -> StoreResult<Vec<Dialogue>> {
        self.call(|db| {
            dialogues::Entity::find()
                .filter(dialogues::Column::Status.eq(DialogueStatus::Assigned.as_str()))
                .order_by_desc(dialogues::Column::StartTime)
                .all(db)?
                .into_iter()
                .map(Dialogue::try_from)
                .collect()
        })
        .await
    }

    /// Every client id that has ever opened a dialogue.
    pub async fn client_ids(&self) -> StoreResult<Vec<i64>> {
        self.call(|db| {
            let ids = dialogues::Entity::find()
                .select_only()
                .column(dialogues::Column::ClientId)
                .distinct()
                .into_tuple::<i64>()
                .all(db)?;
            Ok(ids)
        })
        .await
    }

    pub async fn add_message(
        &self,
        dialogue_id: i64,
        user_id: i64,
        body: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<Message> {
        let record = messages::ActiveModel {
            id: NotSet,
            dialogue_id: Set(dialogue_id),
            user_id: Set(user_id),
            message: Set(body.to_string()),
            timestamp: Set(timestamp.timestamp_micros()),
        };

        self.call(move |db| Message::try_from(record.insert(db)?))
            .await
    }

    pub async fn history(&self, dialogue_id: i64) -> StoreResult<Vec<Message>> {
        self.call(move |db| {
            messages::Entity::find()
                .filter(messages::Column::DialogueId.eq(dialogue_id))
                .order_by_asc(messages::Column::Timestamp)
                .order_by_asc(messages::Column::Id)
                .all(db)?
                .into_iter()
                .map(Message::try_from)
                .collect()
        })
        .await
    }

    pub async fn recent_messages(&self, dialogue_id: i64, n: u64) -> StoreResult<Vec<Message>> {
        self.call(move |db| {
            let mut recent = messages::Entity::find()
                .filter(messages::Column::DialogueId.eq(dialogue_id))
                .order_by_desc(messages::Column::Timestamp)
                .order_by_desc(messages::Column::Id)
                .limit(n)
                .all(db)?
                .into_iter()
                .map(Message::try_from)
                .collect::<StoreResult<Vec<_>>>()?;
            recent.reverse();
            Ok(recent)
        })
        .await
    }

    pub async fn admin_stats(&self, admin_id: i64) -> StoreResult<AdminStats> {
        self.call(move |db| {
            let by_status = |status: DialogueStatus| {
                dialogues::Entity::find()
                    .filter(dialogues::Column::AdminId.eq(admin_id))
                    .filter(dialogues::Column::Status.eq(status.as_str()))
                    .count(db)
            };

            Ok(AdminStats {
                total: dialogues::Entity::find()
                    .filter(dialogues::Column::AdminId.eq(admin_id))
                    .count(db)?,
                active: by_status(DialogueStatus::Assigned)?,
                closed: by_status(DialogueStatus::Closed)?,
            })
        })
        .await
    }

    pub async fn overview(&self) -> StoreResult<Overview> {
        self.call(|db| {
            let by_status = |status: DialogueStatus| {
                dialogues::Entity::find()
                    .filter(dialogues::Column::Status.eq(status.as_str()))
                    .count(db)
            };

            Ok(Overview {
                messages: messages::Entity::find().count(db)?,
                open: by_status(DialogueStatus::Open)?,
                assigned: by_status(DialogueStatus::Assigned)?,
                closed: by_status(DialogueStatus::Closed)?,
                admins: admins::Entity::find().count(db)?,
            })
        })
        .await
    }
}

fn live_dialogue<C: ConnectionTrait>(db: &C, client_id: i64) -> StoreResult<Option<Dialogue>> {
    dialogues::Entity::find()
        .filter(dialogues::Column::ClientId.eq(client_id))
        .filter(dialogues::Column::Status.is_in(DialogueStatus::LIVE))
        .order_by_desc(dialogues::Column::Id)
        .one(db)?
        .map(Dialogue::try_from)
        .transpose()
}
