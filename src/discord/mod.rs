use anyhow::Result;
use serenity::{model::id::ChannelId, prelude::*};
use std::sync::Arc;

mod handler;
mod util;

use crate::{config::Config, desk::SupportDesk};
use handler::*;

pub const DISCORD_MAX_LEN: usize = 2000;

pub struct Bot {
    config: Config,
    desk: Arc<SupportDesk>,
}

impl Bot {
    pub fn new(config: Config, desk: Arc<SupportDesk>) -> Self {
        Self { config, desk }
    }

    pub async fn start(self) -> Result<()> {
        let intents = GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

        let handler = Handler {
            desk: self.desk,
            admin_chat: (self.config.admin_chat_id != 0)
                .then(|| ChannelId::new(self.config.admin_chat_id)),
        };

        let mut client = Client::builder(&self.config.discord_token, intents)
            .event_handler(handler)
            .await?;

        client.start().await?;

        Ok(())
    }
}
