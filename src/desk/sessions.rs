use super::{DeskError, DeskResult, Outgoing, Sender, SupportDesk};
use crate::store::{Admin, DialogueStatus};
use chrono::Utc;
use tracing::info;

impl SupportDesk {
    pub(super) async fn take(&self, admin: Admin, client_id: i64) -> DeskResult<Vec<Outgoing>> {
        if self
            .store
            .assigned_dialogue_for_admin(admin.user_id)
            .await?
            .is_some()
        {
            return Err(DeskError::AdminBusy);
        }

        if self.store.find_admin(client_id).await?.is_some() {
            return Err(DeskError::ClientIsAdmin(client_id));
        }

        let dialogue = self
            .store
            .live_dialogue_for_client(client_id)
            .await?
            .ok_or(DeskError::NothingToTake(client_id))?;
        if dialogue.status == DialogueStatus::Assigned {
            return Err(DeskError::AlreadyTaken(client_id));
        }

        self.store.assign_dialogue(dialogue.id, admin.user_id).await?;
        info!(
            "Admin #{} took client {} (dialogue {})",
            admin.tag, client_id, dialogue.id
        );

        Ok(vec![
            Outgoing::to_user(
                admin.user_id,
                format!(
                    "✅ You are now handling client {} (dialogue {}). Your messages will be relayed to them; /close when done.",
                    client_id, dialogue.id
                ),
            ),
            Outgoing::to_user(
                client_id,
                format!(
                    "👋 Admin #{} joined the conversation. Go ahead!",
                    admin.tag
                ),
            ),
        ])
    }

    /// Ends the sender's dialogue, whether they are the admin or the client.
    pub(super) async fn close(
        &self,
        sender: &Sender,
        caller: Option<&Admin>,
    ) -> DeskResult<Vec<Outgoing>> {
        let now = Utc::now();

        if let Some(admin) = caller {
            let dialogue = self
                .store
                .assigned_dialogue_for_admin(admin.user_id)
                .await?
                .ok_or(DeskError::NoActiveDialogue)?;
            self.store.close_dialogue(dialogue.id, now).await?;
            info!(
                "Admin #{} closed dialogue {} with client {}",
                admin.tag, dialogue.id, dialogue.client_id
            );

            return Ok(vec![
                Outgoing::to_user(
                    admin.user_id,
                    format!("✅ Dialogue with client {} closed.", dialogue.client_id),
                ),
                Outgoing::to_user(
                    dialogue.client_id,
                    "🙏 The dialogue has been closed. Thank you for reaching out! Send a new message any time.",
                ),
            ]);
        }

        let dialogue = self
            .store
            .live_dialogue_for_client(sender.id)
            .await?
            .ok_or(DeskError::NoActiveDialogue)?;
        self.store.close_dialogue(dialogue.id, now).await?;
        info!(
            "Client {} ({}) closed dialogue {}",
            sender.name, sender.id, dialogue.id
        );

        let mut outgoing = vec![Outgoing::to_user(
            sender.id,
            "✅ Dialogue closed. Send a new message any time to start another.",
        )];
        if let Some(admin_id) = dialogue.admin_id {
            outgoing.push(Outgoing::to_user(
                admin_id,
                format!(
                    "🚪 Client {} ({}) closed the dialogue.",
                    sender.name, sender.id
                ),
            ));
        }
        Ok(outgoing)
    }

    pub(super) async fn transfer(&self, admin: Admin, target_id: i64) -> DeskResult<Vec<Outgoing>> {
        if target_id == admin.user_id {
            return Err(DeskError::SelfTransfer);
        }

        let dialogue = self
            .store
            .assigned_dialogue_for_admin(admin.user_id)
            .await?
            .ok_or(DeskError::NoActiveDialogue)?;
        let target = self
            .store
            .find_admin(target_id)
            .await?
            .ok_or(DeskError::NotAnAdmin(target_id))?;

        if !target.active {
            return Err(DeskError::TargetAway(target.tag));
        }
        if self
            .store
            .assigned_dialogue_for_admin(target_id)
            .await?
            .is_some()
        {
            return Err(DeskError::TargetBusy(target.tag));
        }

        self.store.assign_dialogue(dialogue.id, target_id).await?;
        info!(
            "Admin #{} transferred client {} to #{}",
            admin.tag, dialogue.client_id, target.tag
        );

        Ok(vec![
            Outgoing::to_user(
                admin.user_id,
                format!(
                    "✅ Client {} transferred to #{}.",
                    dialogue.client_id, target.tag
                ),
            ),
            Outgoing::to_user(
                target_id,
                format!(
                    "👋 Admin #{} handed you client {} (dialogue {}). Your messages will be relayed to them.",
                    admin.tag, dialogue.client_id, dialogue.id
                ),
            ),
            Outgoing::to_user(
                dialogue.client_id,
                format!("🔄 Your dialogue was transferred to admin #{}.", target.tag),
            ),
        ])
    }
}
