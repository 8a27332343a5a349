//! Daily-tip subscription flow: pick a timezone, then a delivery time.
//!
//! There is deliberately no cancel transition here; the flow ends only on a
//! successful subscription or by the user walking away.

use dptree::case;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::callback;

use super::{GlobalCommand, GlobalDialogue, GlobalState, HandlerResult, HandlerTipScheduler};

const TIMEZONES: [(&str, &str); 4] = [
    ("Москва (UTC+3)", "Europe/Moscow"),
    ("Лондон (UTC+1)", "Europe/London"),
    ("Нью-Йорк (UTC-4)", "America/New_York"),
    ("Токио (UTC+9)", "Asia/Tokyo"),
];

const QUICK_PICK_TIMES: [(u32, u32); 3] = [(8, 0), (12, 0), (18, 0)];

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub(super) enum TipSubscriptionState {
    #[default]
    Start,
    WaitingForTimezone,
    WaitingForTime {
        timezone: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum TimeParseError {
    Format,
    OutOfRange,
}

/// Free-text `HH:MM` with hour 0-23 and minute 0-59.
pub(super) fn parse_custom_time(text: &str) -> Result<(u32, u32), TimeParseError> {
    let (hour, minute) = text.trim().split_once(':').ok_or(TimeParseError::Format)?;
    let hour: i32 = hour.trim().parse().map_err(|_| TimeParseError::Format)?;
    let minute: i32 = minute.trim().parse().map_err(|_| TimeParseError::Format)?;

    if (0..24).contains(&hour) && (0..60).contains(&minute) {
        Ok((hour as u32, minute as u32))
    } else {
        Err(TimeParseError::OutOfRange)
    }
}

fn timezone_keyboard() -> InlineKeyboardMarkup {
    let rows = TIMEZONES.map(|(label, name)| {
        vec![InlineKeyboardButton::callback(
            label,
            callback::encode("TZ", &[name.to_string()]),
        )]
    });
    InlineKeyboardMarkup::new(rows)
}

fn time_choice_keyboard() -> InlineKeyboardMarkup {
    let quick_picks = QUICK_PICK_TIMES
        .map(|(hour, minute)| {
            InlineKeyboardButton::callback(
                format!("{hour:02}:{minute:02}"),
                callback::encode("TIP_TIME", &[hour.to_string(), minute.to_string()]),
            )
        })
        .to_vec();

    InlineKeyboardMarkup::new(vec![
        quick_picks,
        vec![InlineKeyboardButton::callback(
            "Другое время",
            "TIP_TIME_CUSTOM",
        )],
    ])
}

fn confirmation_text(hour: u32, minute: u32, timezone: &str) -> String {
    format!(
        "✅ Отлично! Буду присылать советы в {hour:02}:{minute:02} по часовому поясу {timezone}."
    )
}

async fn subscribe_start(bot: Bot, dialogue: GlobalDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Выбери свой часовой пояс:")
        .reply_markup(timezone_keyboard())
        .await?;

    dialogue
        .update(GlobalState::SubscribingToTips(
            TipSubscriptionState::WaitingForTimezone,
        ))
        .await?;

    Ok(())
}

async fn receive_timezone_choice(
    bot: Bot,
    dialogue: GlobalDialogue,
    query: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(token) = query.data.as_deref() else {
        return Ok(());
    };
    let parts = callback::decode(token);
    if parts.len() != 2 || parts[0] != "TZ" {
        return Ok(());
    }
    let timezone = parts[1].to_string();

    if let Some(message) = query.message.as_ref() {
        bot.edit_message_text(
            message.chat().id,
            message.id(),
            "Теперь выбери время для напоминания:",
        )
        .reply_markup(time_choice_keyboard())
        .await?;
    }

    dialogue
        .update(GlobalState::SubscribingToTips(
            TipSubscriptionState::WaitingForTime { timezone },
        ))
        .await?;

    Ok(())
}

async fn receive_time_choice(
    scheduler: HandlerTipScheduler,
    bot: Bot,
    dialogue: GlobalDialogue,
    timezone: String,
    query: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(token) = query.data.as_deref() else {
        return Ok(());
    };
    let parts = callback::decode(token);

    match parts[0] {
        "TIP_TIME" if parts.len() == 3 => {
            let (Ok(hour), Ok(minute)) = (parts[1].parse::<u32>(), parts[2].parse::<u32>()) else {
                return Ok(());
            };

            scheduler
                .subscribe(dialogue.chat_id().0, hour, minute, &timezone)
                .await?;

            if let Some(message) = query.message.as_ref() {
                bot.edit_message_text(
                    message.chat().id,
                    message.id(),
                    confirmation_text(hour, minute, &timezone),
                )
                .await?;
            }
            dialogue.exit().await?;
        }
        "TIP_TIME_CUSTOM" => {
            if let Some(message) = query.message.as_ref() {
                bot.edit_message_text(
                    message.chat().id,
                    message.id(),
                    "Введи время в формате ЧЧ:ММ (например, 09:30)",
                )
                .await?;
            }
        }
        _ => {}
    }

    Ok(())
}

async fn receive_custom_time(
    scheduler: HandlerTipScheduler,
    bot: Bot,
    dialogue: GlobalDialogue,
    timezone: String,
    msg: Message,
) -> HandlerResult {
    match msg.text().map(parse_custom_time) {
        Some(Ok((hour, minute))) => {
            scheduler
                .subscribe(dialogue.chat_id().0, hour, minute, &timezone)
                .await?;

            bot.send_message(msg.chat.id, confirmation_text(hour, minute, &timezone))
                .await?;
            dialogue.exit().await?;
        }
        Some(Err(TimeParseError::OutOfRange)) => {
            bot.send_message(msg.chat.id, "⛔ Некорректное время. Попробуй снова.")
                .await?;
        }
        Some(Err(TimeParseError::Format)) | None => {
            bot.send_message(
                msg.chat.id,
                "⛔ Неверный формат. Введи время как ЧЧ:ММ (например, 09:30).",
            )
            .await?;
        }
    }

    Ok(())
}

pub(super) fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(teloxide::filter_command::<GlobalCommand, _>().branch(
                    case![GlobalState::Idle]
                        .branch(case![GlobalCommand::Subscribe].endpoint(subscribe_start)),
                ))
                .branch(
                    case![GlobalState::SubscribingToTips(x)].branch(
                        case![TipSubscriptionState::WaitingForTime { timezone }]
                            .chain(dptree::filter(|msg: Message| {
                                msg.text().map_or(true, |text| !text.starts_with('/'))
                            }))
                            .endpoint(receive_custom_time),
                    ),
                ),
        )
        .branch(
            Update::filter_callback_query().branch(
                case![GlobalState::SubscribingToTips(x)]
                    .branch(
                        case![TipSubscriptionState::WaitingForTimezone]
                            .endpoint(receive_timezone_choice),
                    )
                    .branch(
                        case![TipSubscriptionState::WaitingForTime { timezone }]
                            .endpoint(receive_time_choice),
                    ),
            ),
        )
}
