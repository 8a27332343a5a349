mod calendar;
mod clock;
mod create_reminder;
mod delivery;
mod subscribe_tips;

pub use delivery::TelegramTipDelivery;

use std::sync::Arc;

use create_reminder::CreateReminderState;
use dptree::case;
use subscribe_tips::TipSubscriptionState;
use teloxide::{
    dispatching::dialogue::{self, GetChatId, InMemStorage},
    macros::BotCommands,
    prelude::*,
};

use crate::scheduling::TipScheduler;
use crate::storage::ReminderDraftStorage;

type GlobalDialogue = Dialogue<GlobalState, InMemStorage<GlobalState>>;
type HandlerResult = anyhow::Result<()>;
type HandlerDraftStorage = Arc<dyn ReminderDraftStorage>;
type HandlerTipScheduler = Arc<dyn TipScheduler>;

#[derive(Default, Clone, Debug, PartialEq, Eq)]
enum GlobalState {
    #[default]
    Idle,
    SubscribingToTips(TipSubscriptionState),
    CreatingReminder(CreateReminderState),
}

pub struct TelegramInteractionInterface;

impl TelegramInteractionInterface {
    /// Runs the dispatcher until shutdown. Dialogue state is tracked
    /// per chat, which is what guarantees a single active flow per user:
    /// both flow entries are gated on the Idle state.
    pub async fn start(
        bot: Bot,
        scheduler: Arc<dyn TipScheduler>,
        draft_storage: Arc<dyn ReminderDraftStorage>,
    ) {
        log::info!("Starting Telegram interaction interface");

        let info_handler = Update::filter_message().branch(
            teloxide::filter_command::<GlobalCommand, _>()
                .branch(case![GlobalCommand::Start].endpoint(start_command))
                .branch(case![GlobalCommand::GlobalWarming].endpoint(global_warming))
                .branch(case![GlobalCommand::What].endpoint(what))
                .branch(case![GlobalCommand::Why].endpoint(why)),
        );

        let invalid_state_handler =
            Update::filter_message().branch(dptree::endpoint(invalid_state));

        let stale_callback_handler =
            Update::filter_callback_query().branch(dptree::endpoint(stale_query));

        let schema = dialogue::enter::<Update, InMemStorage<GlobalState>, GlobalState, _>()
            .branch(info_handler)
            .branch(subscribe_tips::schema())
            .branch(create_reminder::schema())
            .branch(invalid_state_handler)
            .branch(stale_callback_handler);

        Dispatcher::builder(bot, schema)
            .dependencies(dptree::deps![
                InMemStorage::<GlobalState>::new(),
                scheduler,
                draft_storage
            ])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await
    }
}

async fn start_command(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "🍵 Привет. Я EcoHelper🕊️, твой персональный эко-помощник. \
         Тут ты можешь узнать о глобальном потеплении и решении этой проблемы. \
         Каждый день я буду присылать тебе простые советы. \
         Хочешь узнать больше о глобальном потеплении? нажми команду /globalwarming\n\n\
         Также я могу помочь с напоминаниями - используй /reminder",
    )
    .await?;
    Ok(())
}

async fn global_warming(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "🌍 Глобальное потепление — повышение средней температуры климатической системы Земли. \
         Узнать больше: /what",
    )
    .await?;
    Ok(())
}

async fn what(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "🔥 Последствия изменения климата:\n\
         - Сильные засухи и нехватка воды\n\
         - Повышение уровня моря\n\
         - Катастрофические погодные явления\n\
         - Сокращение биоразнообразия\n\
         Причины: /why",
    )
    .await?;
    Ok(())
}

async fn why(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "📈 Основные причины глобального потепления:\n\
         1. Выбросы парниковых газов (CO2, метан)\n\
         2. Сжигание ископаемого топлива\n\
         3. Вырубка лесов\n\
         4. Промышленные процессы\n\
         5. Свалки мусора (выделяют метан)\n\n\
         💡 Каждый может помочь: начните с малого - используйте /subscribe",
    )
    .await?;
    Ok(())
}

async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Не понимаю это сообщение. Попробуй команду /start.",
    )
    .await?;
    Ok(())
}

/// Button presses that no active flow claims are stale by definition (an
/// old widget, a double tap after the flow ended). They are answered to
/// stop the client spinner and otherwise dropped without a reply.
async fn stale_query(bot: Bot, query: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;
    log::debug!("Ignoring stale callback query from chat {:?}", query.chat_id());
    Ok(())
}

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum GlobalCommand {
    Start,
    Subscribe,
    Reminder,
    Cancel,
    GlobalWarming,
    What,
    Why,
}
