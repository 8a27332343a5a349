use async_trait::async_trait;
use teloxide::prelude::*;

use crate::scheduling::TipDeliveryChannel;
use crate::storage::UserId;

pub struct TelegramTipDelivery {
    bot: Bot,
}

impl TelegramTipDelivery {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl TipDeliveryChannel for TelegramTipDelivery {
    async fn send_tip(&self, user_id: UserId, text: &str) -> anyhow::Result<()> {
        self.bot.send_message(ChatId(user_id), text).await?;
        Ok(())
    }
}
