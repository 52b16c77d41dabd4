use super::{DeskError, DeskResult, MAX_MESSAGE_LENGTH, Outgoing, Sender, SupportDesk};
use crate::store::{Admin, Dialogue, DialogueStatus};
use chrono::{DateTime, Utc};
use tracing::info;

impl SupportDesk {
    /// Routes a plain (non-command) message to the dialogue it belongs to.
    pub(super) async fn route(&self, sender: &Sender, text: &str) -> DeskResult<Vec<Outgoing>> {
        let length = text.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            return Err(DeskError::MessageTooLong(length, MAX_MESSAGE_LENGTH));
        }

        if let Some(admin) = self.store.find_admin(sender.id).await? {
            return self.relay_from_admin(&admin, text).await;
        }

        if let Some(tag) = requested_tag(text) {
            return self.select_admin(sender, tag).await;
        }

        self.relay_from_client(sender, text).await
    }

    async fn relay_from_admin(&self, admin: &Admin, text: &str) -> DeskResult<Vec<Outgoing>> {
        let dialogue = self
            .store
            .assigned_dialogue_for_admin(admin.user_id)
            .await?
            .ok_or(DeskError::NoActiveDialogue)?;

        self.store
            .add_message(dialogue.id, admin.user_id, text, stamp(&dialogue, Utc::now()))
            .await?;
        info!(
            "Admin #{} replied to client {} in dialogue {}",
            admin.tag, dialogue.client_id, dialogue.id
        );

        Ok(vec![Outgoing::to_user(
            dialogue.client_id,
            format!("💬 #{}:\n{}", admin.tag, text),
        )])
    }

    async fn relay_from_client(&self, sender: &Sender, text: &str) -> DeskResult<Vec<Outgoing>> {
        let now = Utc::now();
        let (dialogue, created) = self.store.open_or_create_dialogue(sender.id, now).await?;
        self.store
            .add_message(dialogue.id, sender.id, text, stamp(&dialogue, now))
            .await?;

        let mut outgoing = Vec::new();
        match dialogue.admin_id {
            Some(admin_id) if dialogue.status == DialogueStatus::Assigned => {
                info!(
                    "Relayed message from client {} to admin {} in dialogue {}",
                    sender.id, admin_id, dialogue.id
                );
                outgoing.push(Outgoing::to_user(
                    admin_id,
                    format!("📨 {} ({}):\n{}", sender.name, sender.id, text),
                ));
            }
            _ => {
                info!(
                    "Announced unassigned dialogue {} from client {}",
                    dialogue.id, sender.id
                );
                outgoing.push(Outgoing::to_admin_chat(format!(
                    "📩 New message from {} ({}) in dialogue {}:\n{}\n\nReply with /take {}",
                    sender.name, sender.id, dialogue.id, text, sender.id
                )));
                if created {
                    outgoing.push(Outgoing::to_user(
                        sender.id,
                        "✅ Your message has been received. An admin will answer shortly.\n\
                         💡 Use /admins to pick a specific admin.",
                    ));
                }
            }
        }
        Ok(outgoing)
    }

    /// A client asking for a specific admin with `#tag`.
    async fn select_admin(&self, sender: &Sender, tag: &str) -> DeskResult<Vec<Outgoing>> {
        let admin = self
            .store
            .find_admin_by_tag(tag)
            .await?
            .ok_or_else(|| DeskError::UnknownTag(tag.to_string()))?;

        if self
            .store
            .live_dialogue_for_client(sender.id)
            .await?
            .is_some_and(|d| d.status == DialogueStatus::Assigned)
        {
            return Err(DeskError::AlreadyAssigned);
        }
        if !admin.active {
            return Err(DeskError::TargetAway(admin.tag));
        }
        if self
            .store
            .assigned_dialogue_for_admin(admin.user_id)
            .await?
            .is_some()
        {
            return Err(DeskError::TargetBusy(admin.tag));
        }

        let (dialogue, _) = self
            .store
            .open_or_create_dialogue(sender.id, Utc::now())
            .await?;

        self.store.assign_dialogue(dialogue.id, admin.user_id).await?;
        info!(
            "Client {} ({}) picked admin #{} for dialogue {}",
            sender.name, sender.id, admin.tag, dialogue.id
        );

        Ok(vec![
            Outgoing::to_user(
                sender.id,
                format!("✅ You are now talking to admin #{}. Go ahead!", admin.tag),
            ),
            Outgoing::to_user(
                admin.user_id,
                format!(
                    "👋 Client {} ({}) picked you. Your messages now go to them; /close when done.",
                    sender.name, sender.id
                ),
            ),
        ])
    }
}

/// `#tag` on its own selects an admin; anything longer is an ordinary message.
fn requested_tag(text: &str) -> Option<&str> {
    text.strip_prefix('#')
        .filter(|tag| !tag.is_empty() && !tag.contains(char::is_whitespace))
}

/// Message timestamps never precede the dialogue they belong to.
fn stamp(dialogue: &Dialogue, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(dialogue.start_time)
}
