use super::passwords::{NO_PASSWORD, hash_password, verify_password};
use super::{DeskError, DeskResult, Outgoing, ROOT_ADMIN_TAG, Redemption, Sender, SupportDesk};
use crate::store::{AccessLevel, Admin, NewAdmin};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

const MAX_TAG_LEN: usize = 32;

impl SupportDesk {
    /// Makes sure the configured root admin exists at tier 2.
    pub async fn seed_root_admin(&self, user_id: i64) -> Result<()> {
        if user_id == 0 {
            return Ok(());
        }

        match self.store.find_admin(user_id).await? {
            Some(admin) if admin.is_elevated() => {}
            Some(admin) => {
                self.store
                    .set_admin_level(user_id, AccessLevel::Elevated)
                    .await?;
                info!("Raised configured root admin #{} to tier 2", admin.tag);
            }
            None => {
                let tag = match self.store.find_admin_by_tag(ROOT_ADMIN_TAG).await? {
                    Some(_) => format!("{}{}", ROOT_ADMIN_TAG, user_id),
                    None => ROOT_ADMIN_TAG.to_string(),
                };
                let password_hash = match &self.master_password {
                    Some(password) => hash_password(password).await?,
                    None => NO_PASSWORD.to_string(),
                };
                self.store
                    .insert_admin(NewAdmin {
                        user_id,
                        tag,
                        level: AccessLevel::Elevated,
                        password_hash,
                    })
                    .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn set_tag(
        &self,
        sender: &Sender,
        caller: Option<Admin>,
        password: &str,
        raw_tag: &str,
    ) -> DeskResult<Vec<Outgoing>> {
        let tag = normalize_tag(raw_tag)?;
        if let Some(owner) = self.store.find_admin_by_tag(&tag).await?
            && owner.user_id != sender.id
        {
            return Err(DeskError::TagTaken(owner.tag));
        }

        self.authorize(password, caller.as_ref(), Utc::now()).await?;

        let mut outgoing = Vec::new();
        let reply = match caller {
            Some(admin) => {
                self.store.set_admin_tag(sender.id, &tag).await?;
                info!(
                    "Admin {} ({}) changed tag #{} -> #{}",
                    sender.name, sender.id, admin.tag, tag
                );
                format!("✅ Tag changed to #{}. You remain a {} admin.", tag, admin.level)
            }
            None => {
                outgoing.extend(self.retire_client_dialogue(sender).await?);
                let admin = self
                    .store
                    .insert_admin(NewAdmin {
                        user_id: sender.id,
                        tag,
                        level: AccessLevel::Basic,
                        password_hash: hash_password(password).await?,
                    })
                    .await?;
                format!(
                    "✅ Tag set: #{}. You are now a {} admin. Use /admin to open your panel.",
                    admin.tag, admin.level
                )
            }
        };

        outgoing.insert(0, Outgoing::to_user(sender.id, reply));
        Ok(outgoing)
    }

    /// Closes the sender's own client dialogue when they register as an admin.
    async fn retire_client_dialogue(&self, sender: &Sender) -> DeskResult<Vec<Outgoing>> {
        let Some(dialogue) = self.store.live_dialogue_for_client(sender.id).await? else {
            return Ok(Vec::new());
        };
        self.store.close_dialogue(dialogue.id, Utc::now()).await?;
        info!(
            "Closed dialogue {} of {} ({}) on admin registration",
            dialogue.id, sender.name, sender.id
        );

        Ok(dialogue
            .admin_id
            .map(|admin_id| {
                Outgoing::to_user(
                    admin_id,
                    format!(
                        "🚪 Client {} ({}) became an admin; their dialogue was closed.",
                        sender.name, sender.id
                    ),
                )
            })
            .into_iter()
            .collect())
    }

    /// Accepts the configured admin password, the caller's own registered
    /// password, or an unexpired one-time password (which is consumed).
    async fn authorize(
        &self,
        password: &str,
        caller: Option<&Admin>,
        now: DateTime<Utc>,
    ) -> DeskResult<()> {
        if self.master_password.as_deref() == Some(password) {
            return Ok(());
        }
        if let Some(admin) = caller
            && verify_password(password, &admin.password_hash).await
        {
            return Ok(());
        }

        match self.passwords.redeem(password, now).await {
            Redemption::Accepted => Ok(()),
            Redemption::Expired => Err(DeskError::ExpiredPassword),
            Redemption::Unknown => Err(DeskError::BadPassword),
        }
    }

    pub(super) async fn set_level(
        &self,
        caller: Admin,
        user_id: i64,
        level: AccessLevel,
    ) -> DeskResult<Vec<Outgoing>> {
        if user_id == caller.user_id {
            return Err(DeskError::SelfLevelChange);
        }

        let target = self
            .store
            .find_admin(user_id)
            .await?
            .ok_or(DeskError::NotAnAdmin(user_id))?;

        if target.level == level {
            return Ok(vec![Outgoing::to_user(
                caller.user_id,
                format!("ℹ️ Admin #{} is already {}.", target.tag, level),
            )]);
        }

        self.store.set_admin_level(user_id, level).await?;
        info!(
            "Admin #{} changed #{} ({}) from {} to {}",
            caller.tag, target.tag, user_id, target.level, level
        );

        Ok(vec![
            Outgoing::to_user(
                caller.user_id,
                format!("✅ Admin #{} ({}) is now {}.", target.tag, user_id, level),
            ),
            Outgoing::to_user(
                user_id,
                format!("🎉 Your access level was changed to {}.", level),
            ),
        ])
    }

    pub(super) async fn toggle_status(&self, caller: Admin) -> DeskResult<Vec<Outgoing>> {
        let active = !caller.active;
        self.store.set_admin_active(caller.user_id, active).await?;
        info!(
            "Admin #{} is now {}",
            caller.tag,
            if active { "available" } else { "away" }
        );

        let text = if active {
            "🟢 You are available. Clients can pick you again."
        } else {
            "⚫ You are away. Clients cannot pick you until you switch back."
        };
        Ok(vec![Outgoing::to_user(caller.user_id, text)])
    }

    pub(super) async fn issue_password(&self, caller: Admin) -> DeskResult<Vec<Outgoing>> {
        let password = self.passwords.issue(Utc::now()).await;
        info!("Admin #{} issued a one-time password", caller.tag);

        Ok(vec![Outgoing::to_user(
            caller.user_id,
            format!(
                "🔑 One-time admin password: `{}`\n\
                 It is valid for 24 hours and works once. The new admin should send:\n\
                 `/set_tag {} <tag>`",
                password, password
            ),
        )])
    }
}

fn normalize_tag(raw: &str) -> DeskResult<String> {
    let tag = raw.strip_prefix('#').unwrap_or(raw);
    if tag.is_empty() {
        return Err(DeskError::InvalidTag("it cannot be empty"));
    }
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(DeskError::InvalidTag("use at most 32 characters"));
    }
    if !tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DeskError::InvalidTag(
            "use only letters, digits, '_' and '-'",
        ));
    }
    Ok(tag.to_string())
}
