mod appsettings;
mod callback;
mod scheduling;
mod storage;
mod telegram;
mod tips;

use std::sync::Arc;

use chrono_tz::Tz;
use teloxide::Bot;

use crate::scheduling::{DailyTipScheduler, TipScheduler};
use crate::storage::{
    JsonDraftStorage, ReminderDraftStorage, SqliteTipScheduleStorage, TipScheduleStorage,
};
use crate::telegram::{TelegramInteractionInterface, TelegramTipDelivery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = appsettings::get();
    let default_timezone: Tz = settings
        .scheduling
        .default_timezone
        .parse()
        .map_err(|_| {
            anyhow::anyhow!(
                "unknown default timezone {}",
                settings.scheduling.default_timezone
            )
        })?;

    let bot = Bot::new(settings.telegram.token.clone());

    let schedule_storage: Arc<dyn TipScheduleStorage> =
        Arc::new(SqliteTipScheduleStorage::connect(&settings.storage.database_path).await?);
    let draft_storage: Arc<dyn ReminderDraftStorage> =
        Arc::new(JsonDraftStorage::new(settings.storage.reminder_file.clone()));

    let delivery = Arc::new(TelegramTipDelivery::new(bot.clone()));
    let scheduler: Arc<dyn TipScheduler> = Arc::new(DailyTipScheduler::new(
        schedule_storage,
        delivery,
        default_timezone,
    ));

    scheduler.restore_all().await?;

    TelegramInteractionInterface::start(bot, scheduler, draft_storage).await;

    Ok(())
}
