use super::{
    CommandKind, DeskError, DeskResult, MAX_MESSAGE_LENGTH, Outgoing, Sender, SupportDesk,
};
use crate::store::{Admin, Message};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use tracing::info;

const MONITOR_PREVIEW: u64 = 3;
const PREVIEW_CHARS: usize = 50;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl SupportDesk {
    pub(super) fn start(&self, sender: &Sender) -> Vec<Outgoing> {
        vec![Outgoing::to_user(
            sender.id,
            format!(
                "👋 Welcome to support, {}!\n\n\
                 🔹 Just write a message and an admin will answer\n\
                 🔹 Use /admins to pick a specific admin\n\
                 🔹 Use /help to see every command",
                sender.name
            ),
        )]
    }

    pub(super) fn help(&self, sender: &Sender, caller: Option<&Admin>) -> Vec<Outgoing> {
        let mut text = String::from("📖 Available commands:\n");
        for kind in CommandKind::ALL {
            if kind.access().allows(caller) {
                let _ = write!(text, "\n{} - {}", kind.usage(), kind.summary());
            }
        }
        vec![Outgoing::to_user(sender.id, text)]
    }

    pub(super) async fn panel(&self, sender: &Sender, admin: Admin) -> DeskResult<Vec<Outgoing>> {
        let current = self.store.assigned_dialogue_for_admin(admin.user_id).await?;
        info!("Admin #{} opened the panel", admin.tag);

        let mut text = format!(
            "⚙️ Admin panel\n\nTag: #{}\nLevel: {}\nStatus: {}\nDialogue: ",
            admin.tag,
            admin.level,
            if admin.active {
                "🟢 available"
            } else {
                "⚫ away"
            }
        );
        match current {
            Some(d) => {
                let _ = write!(text, "client {} (dialogue {})", d.client_id, d.id);
            }
            None => text.push_str("none"),
        }
        text.push_str("\n\nCommands:");
        for kind in CommandKind::ALL {
            if kind.access() != super::Access::Anyone && kind.access().allows(Some(&admin)) {
                let _ = write!(text, "\n{}", kind.usage());
            }
        }

        Ok(vec![Outgoing::to_user(sender.id, text)])
    }

    pub(super) async fn list_admins(&self, sender: &Sender) -> DeskResult<Vec<Outgoing>> {
        let admins = self.store.list_admins().await?;
        if admins.is_empty() {
            return Ok(vec![Outgoing::to_user(
                sender.id,
                "😔 There are no admins yet. Please try again later!",
            )]);
        }

        let busy: HashSet<i64> = self
            .store
            .assigned_dialogues()
            .await?
            .into_iter()
            .filter_map(|d| d.admin_id)
            .collect();

        let mut text = String::from("📋 Admins:\n");
        let mut anyone_free = false;
        for admin in &admins {
            let state = if busy.contains(&admin.user_id) {
                "🔴 busy"
            } else if !admin.active {
                "⚫ away"
            } else {
                anyone_free = true;
                "🟢 available"
            };
            let _ = write!(text, "\n{} #{}", state, admin.tag);
        }

        text.push_str(if anyone_free {
            "\n\n💡 To pick an admin, send their tag, for example #support"
        } else {
            "\n\n😔 Every admin is busy or away right now. Your messages still reach the team."
        });
        Ok(vec![Outgoing::to_user(sender.id, text)])
    }

    pub(super) async fn stats(&self, admin: Admin) -> DeskResult<Vec<Outgoing>> {
        let overview = self.store.overview().await?;
        let own = self.store.admin_stats(admin.user_id).await?;

        let text = format!(
            "📊 Statistics\n\n\
             📨 Messages: {}\n\
             💬 Dialogues: {} waiting, {} assigned, {} closed\n\
             👥 Admins: {}\n\n\
             #{}: {} dialogues, {} active, {} closed",
            overview.messages,
            overview.open,
            overview.assigned,
            overview.closed,
            overview.admins,
            admin.tag,
            own.total,
            own.active,
            own.closed
        );
        Ok(vec![Outgoing::to_user(admin.user_id, text)])
    }

    pub(super) async fn monitor(&self, caller: Admin) -> DeskResult<Vec<Outgoing>> {
        let dialogues = self.store.assigned_dialogues().await?;
        if dialogues.is_empty() {
            return Ok(vec![Outgoing::to_user(
                caller.user_id,
                "📊 There are no active dialogues right now.",
            )]);
        }

        let tags = self.tags_by_user().await?;
        let mut text = String::from("📊 Active dialogues:");
        for dialogue in &dialogues {
            let admin_tag = dialogue
                .admin_id
                .and_then(|id| tags.get(&id))
                .map_or("unknown", String::as_str);
            let _ = write!(
                text,
                "\n\n👨‍💼 #{} ↔ 👤 client {} (dialogue {}, since {})",
                admin_tag,
                dialogue.client_id,
                dialogue.id,
                dialogue.start_time.format(TIME_FORMAT)
            );

            for message in self
                .store
                .recent_messages(dialogue.id, MONITOR_PREVIEW)
                .await?
            {
                let icon = if message.user_id == dialogue.client_id {
                    "👤"
                } else {
                    "👨‍💼"
                };
                let _ = write!(text, "\n  {} {}", icon, preview(&message.body));
            }
        }

        Ok(vec![Outgoing::to_user(caller.user_id, text)])
    }

    pub(super) async fn history(&self, caller: Admin, dialogue_id: i64) -> DeskResult<Vec<Outgoing>> {
        let dialogue = self
            .store
            .get_dialogue(dialogue_id)
            .await?
            .ok_or(DeskError::DialogueNotFound(dialogue_id))?;
        if !caller.is_elevated() && dialogue.admin_id != Some(caller.user_id) {
            return Err(DeskError::InsufficientPrivilege(
                "you can only read dialogues assigned to you",
            ));
        }

        let messages = self.store.history(dialogue_id).await?;
        let tags = self.tags_by_user().await?;

        let mut text = format!(
            "🗂 Dialogue {} with client {} ({})",
            dialogue.id, dialogue.client_id, dialogue.status
        );
        if messages.is_empty() {
            text.push_str("\n\n(no messages)");
        }
        for message in &messages {
            let _ = write!(text, "\n{}", history_line(message, dialogue.client_id, &tags));
        }

        Ok(vec![Outgoing::to_user(caller.user_id, text)])
    }

    pub(super) async fn broadcast(&self, caller: Admin, text: &str) -> DeskResult<Vec<Outgoing>> {
        let admin_ids: HashSet<i64> = self
            .store
            .list_admins()
            .await?
            .into_iter()
            .map(|a| a.user_id)
            .collect();
        let recipients: Vec<i64> = self
            .store
            .client_ids()
            .await?
            .into_iter()
            .filter(|id| !admin_ids.contains(id))
            .collect();

        info!(
            "Admin #{} broadcast to {} clients",
            caller.tag,
            recipients.len()
        );

        let mut outgoing: Vec<Outgoing> = recipients
            .iter()
            .map(|&id| Outgoing::to_user(id, format!("📢 Announcement:\n\n{}", text)))
            .collect();
        outgoing.push(Outgoing::to_user(
            caller.user_id,
            format!("📢 Broadcast queued for {} clients.", recipients.len()),
        ));
        Ok(outgoing)
    }

    /// Forwards feedback to the admin chat; nothing is stored.
    pub(super) fn feedback(&self, sender: &Sender, text: &str) -> DeskResult<Vec<Outgoing>> {
        let length = text.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            return Err(DeskError::MessageTooLong(length, MAX_MESSAGE_LENGTH));
        }

        info!("Feedback from {} ({})", sender.name, sender.id);
        Ok(vec![
            Outgoing::to_admin_chat(format!(
                "📝 Feedback from {} ({}):\n{}",
                sender.name, sender.id, text
            )),
            Outgoing::to_user(
                sender.id,
                "🙏 Thank you for your feedback! The team will read it.",
            ),
        ])
    }

    async fn tags_by_user(&self) -> DeskResult<HashMap<i64, String>> {
        Ok(self
            .store
            .list_admins()
            .await?
            .into_iter()
            .map(|a| (a.user_id, a.tag))
            .collect())
    }
}

fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn history_line(message: &Message, client_id: i64, tags: &HashMap<i64, String>) -> String {
    let author = if message.user_id == client_id {
        "client".to_string()
    } else {
        tags.get(&message.user_id)
            .map_or_else(|| message.user_id.to_string(), |tag| format!("#{}", tag))
    };
    format!(
        "[{}] {}: {}",
        message.timestamp.format(TIME_FORMAT),
        author,
        message.body
    )
}
