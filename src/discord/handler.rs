use super::{DISCORD_MAX_LEN, util::split_message};
use crate::desk::{Inbound, Outgoing, Sender, SupportDesk, Target};
use serenity::{
    all::Http,
    async_trait,
    model::{
        channel::Message,
        gateway::Ready,
        id::{ChannelId, UserId},
    },
    prelude::*,
};
use std::sync::Arc;
use tracing::{error, info, warn};

const FAILURE_REPLY: &str =
    "⚠️ Something went wrong while handling your message. Please try again later.";

pub(super) struct Handler {
    pub desk: Arc<SupportDesk>,
    pub admin_chat: Option<ChannelId>,
}

impl Handler {
    async fn deliver(&self, http: &Http, outgoing: &[Outgoing]) {
        for message in outgoing {
            let channel = match message.target {
                Target::User(user_id) => match dm_channel(http, user_id).await {
                    Ok(channel) => channel,
                    Err(e) => {
                        error!("Failed to open DM with user {}: {}", user_id, e);
                        continue;
                    }
                },
                Target::AdminChat => match self.admin_chat {
                    Some(channel) => channel,
                    None => {
                        warn!("Admin chat is not configured, dropping announcement");
                        continue;
                    }
                },
            };

            for chunk in split_message(&message.text, DISCORD_MAX_LEN) {
                if let Err(e) = channel.say(http, &chunk).await {
                    error!("Failed to deliver message to {:?}: {}", message.target, e);
                    break;
                }
            }
        }
    }
}

async fn dm_channel(http: &Http, user_id: i64) -> serenity::Result<ChannelId> {
    let user = UserId::new(user_id as u64);
    Ok(user.create_dm_channel(http).await?.id)
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_some() {
            return;
        }

        let author = &msg.author;
        let inbound = Inbound {
            sender: Sender {
                id: author.id.get() as i64,
                name: author
                    .global_name
                    .clone()
                    .unwrap_or_else(|| author.name.clone()),
            },
            text: msg.content.clone(),
        };

        match self.desk.handle(&inbound).await {
            Ok(outgoing) => self.deliver(&ctx.http, &outgoing).await,
            Err(e) => {
                error!(
                    "Failed to handle message from {} ({}): {}",
                    inbound.sender.name, inbound.sender.id, e
                );
                if let Err(e) = msg.channel_id.say(&ctx.http, FAILURE_REPLY).await {
                    error!("Failed to send failure reply to {}: {}", inbound.sender.id, e);
                }
            }
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Bot connected as {}", ready.user.name);
        if self.admin_chat.is_none() {
            warn!("No admin chat configured; new dialogues will not be announced");
        }
    }
}
