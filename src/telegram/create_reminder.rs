//! Reminder creation flow: name, date via the calendar widget, time via the
//! clock widget, optional extra info, then commit.

use chrono::NaiveDate;
use dptree::case;
use rand::Rng;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};

use crate::storage::ReminderDraft;

use super::{
    GlobalCommand, GlobalDialogue, GlobalState, HandlerDraftStorage, HandlerResult, calendar, clock,
};

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub(super) enum CreateReminderState {
    #[default]
    Start,
    WaitingForName,
    WaitingForDate,
    WaitingForTime,
    WaitingForInfoChoice,
    WaitingForInfoText,
}

fn format_reminder_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn extra_info_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new("Да"),
        KeyboardButton::new("Нет"),
    ]])
    .one_time_keyboard()
    .resize_keyboard()
}

async fn create_reminder_start(bot: Bot, dialogue: GlobalDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "📝 Введите название события для напоминания:")
        .await?;

    dialogue
        .update(GlobalState::CreatingReminder(
            CreateReminderState::WaitingForName,
        ))
        .await?;

    Ok(())
}

async fn receive_name(
    drafts: HandlerDraftStorage,
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(name) => {
            // A fresh draft discards whatever the user left unfinished.
            drafts.begin_draft(msg.chat.id.0, name).await?;

            bot.send_message(msg.chat.id, format!("📅 Выберите дату для {name}:"))
                .reply_markup(calendar::render(None, None))
                .await?;

            dialogue
                .update(GlobalState::CreatingReminder(
                    CreateReminderState::WaitingForDate,
                ))
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Пожалуйста, отправь название текстом.")
                .await?;
        }
    }

    Ok(())
}

async fn receive_date_selection(
    drafts: HandlerDraftStorage,
    bot: Bot,
    dialogue: GlobalDialogue,
    query: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(token) = query.data.as_deref() else {
        return Ok(());
    };

    match calendar::step(token) {
        calendar::CalendarStep::Picked(date) => {
            let user_id = dialogue.chat_id().0;
            let formatted = format_reminder_date(date);
            drafts.set_date(user_id, &formatted).await?;

            if let Some(message) = query.message.as_ref() {
                bot.edit_message_text(
                    message.chat().id,
                    message.id(),
                    format!("Вы выбрали: {formatted}"),
                )
                .await?;
            }

            let tz_offset = drafts.timezone_offset(user_id).await?;
            bot.send_message(dialogue.chat_id(), "⏰ Выберите время:")
                .reply_markup(clock::render(tz_offset))
                .await?;

            dialogue
                .update(GlobalState::CreatingReminder(
                    CreateReminderState::WaitingForTime,
                ))
                .await?;
        }
        calendar::CalendarStep::Month { year, month } => {
            if let Some(message) = query.message.as_ref() {
                bot.edit_message_reply_markup(message.chat().id, message.id())
                    .reply_markup(calendar::render(Some(year), Some(month)))
                    .await?;
            }
        }
        calendar::CalendarStep::Noop => {}
    }

    Ok(())
}

async fn receive_time_selection(
    drafts: HandlerDraftStorage,
    bot: Bot,
    dialogue: GlobalDialogue,
    query: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(query.id.clone()).await?;

    let Some(token) = query.data.as_deref() else {
        return Ok(());
    };

    match clock::step(token) {
        clock::ClockStep::Confirmed(time) => {
            let user_id = dialogue.chat_id().0;
            let reminder_id = rand::thread_rng().gen_range(0..100_000);
            let formatted = time.to_string();
            drafts.set_time(user_id, &formatted, reminder_id).await?;

            if let Some(message) = query.message.as_ref() {
                bot.edit_message_text(
                    message.chat().id,
                    message.id(),
                    format!("Вы выбрали: {formatted}"),
                )
                .await?;
            }

            bot.send_message(dialogue.chat_id(), "Добавить дополнительную информацию?")
                .reply_markup(extra_info_keyboard())
                .await?;

            dialogue
                .update(GlobalState::CreatingReminder(
                    CreateReminderState::WaitingForInfoChoice,
                ))
                .await?;
        }
        clock::ClockStep::Redraw(time) => {
            if let Some(message) = query.message.as_ref() {
                bot.edit_message_reply_markup(message.chat().id, message.id())
                    .reply_markup(clock::render_at(&time))
                    .await?;
            }
        }
        clock::ClockStep::Noop => {}
    }

    Ok(())
}

async fn receive_info_choice(
    drafts: HandlerDraftStorage,
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some("Да") => {
            bot.send_message(msg.chat.id, "Введите дополнительную информацию:")
                .await?;
            dialogue
                .update(GlobalState::CreatingReminder(
                    CreateReminderState::WaitingForInfoText,
                ))
                .await?;
        }
        Some(_) => {
            save_reminder(&drafts, &bot, &dialogue, None).await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Ответь, пожалуйста, Да или Нет.")
                .await?;
        }
    }

    Ok(())
}

async fn receive_extra_info(
    drafts: HandlerDraftStorage,
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(info) => save_reminder(&drafts, &bot, &dialogue, Some(info)).await?,
        None => {
            bot.send_message(msg.chat.id, "Пожалуйста, отправь текст.")
                .await?;
        }
    }

    Ok(())
}

/// Commit: read the draft back, attach the optional note, confirm. A draft
/// that is missing or incomplete at this point cannot be recovered
/// mid-dialogue, so the flow ends with a generic error.
async fn save_reminder(
    drafts: &HandlerDraftStorage,
    bot: &Bot,
    dialogue: &GlobalDialogue,
    extra_info: Option<&str>,
) -> HandlerResult {
    let user_id = dialogue.chat_id().0;
    let draft = drafts.current_draft(user_id).await?;

    let Some(completed) = draft.as_ref().and_then(ReminderDraft::completed) else {
        log::error!("Reminder draft for user {user_id} is missing or incomplete at commit time");
        bot.send_message(dialogue.chat_id(), "Произошла ошибка. Попробуйте снова.")
            .reply_markup(KeyboardRemove::new())
            .await?;
        dialogue.exit().await?;
        return Ok(());
    };

    if let Some(info) = extra_info {
        drafts.set_extra_info(user_id, info).await?;
    }

    bot.send_message(
        dialogue.chat_id(),
        format!(
            "✅ Напоминание сохранено!\n\nСобытие: {}\nДата: {}\nВремя: {}",
            completed.name, completed.date, completed.time
        ),
    )
    .reply_markup(KeyboardRemove::new())
    .await?;

    dialogue.exit().await?;
    Ok(())
}

async fn cancel_reminder(
    drafts: HandlerDraftStorage,
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
) -> HandlerResult {
    drafts.remove_draft(msg.chat.id.0).await?;

    bot.send_message(msg.chat.id, "❌ Создание напоминания отменено.")
        .reply_markup(KeyboardRemove::new())
        .await?;

    dialogue.exit().await?;
    Ok(())
}

pub(super) fn schema() -> UpdateHandler<anyhow::Error> {
    let non_command_text =
        || dptree::filter(|msg: Message| msg.text().map_or(true, |text| !text.starts_with('/')));

    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    teloxide::filter_command::<GlobalCommand, _>()
                        .branch(
                            case![GlobalState::Idle].branch(
                                case![GlobalCommand::Reminder].endpoint(create_reminder_start),
                            ),
                        )
                        .branch(
                            case![GlobalState::CreatingReminder(x)]
                                .branch(case![GlobalCommand::Cancel].endpoint(cancel_reminder)),
                        ),
                )
                .branch(
                    case![GlobalState::CreatingReminder(x)]
                        .branch(
                            case![CreateReminderState::WaitingForName]
                                .chain(non_command_text())
                                .endpoint(receive_name),
                        )
                        .branch(
                            case![CreateReminderState::WaitingForInfoChoice]
                                .chain(non_command_text())
                                .endpoint(receive_info_choice),
                        )
                        .branch(
                            case![CreateReminderState::WaitingForInfoText]
                                .chain(non_command_text())
                                .endpoint(receive_extra_info),
                        ),
                ),
        )
        .branch(
            Update::filter_callback_query().branch(
                case![GlobalState::CreatingReminder(x)]
                    .branch(
                        case![CreateReminderState::WaitingForDate]
                            .endpoint(receive_date_selection),
                    )
                    .branch(
                        case![CreateReminderState::WaitingForTime]
                            .endpoint(receive_time_selection),
                    ),
            ),
        )
}

#[cfg(test)]
mod tests {
    use crate::storage::{JsonDraftStorage, ReminderDraftStorage};

    use super::*;

    #[test]
    fn dates_are_formatted_day_month_year() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(format_reminder_date(date), "15/06/2024");
    }

    /// The storage side of the happy path: name, date pick, time pick,
    /// "Нет" — the committed draft matches what the flow promised.
    #[tokio::test]
    async fn draft_sequence_matches_the_dialogue_order() {
        let dir = tempfile::tempdir().unwrap();
        let drafts = JsonDraftStorage::new(dir.path().join("reminder.json"));
        let user_id = 1;

        drafts.begin_draft(user_id, "Meeting").await.unwrap();

        let calendar::CalendarStep::Picked(date) = calendar::step("DAY;2024;6;15") else {
            panic!("day press must finalize the date");
        };
        drafts
            .set_date(user_id, &format_reminder_date(date))
            .await
            .unwrap();

        let clock::ClockStep::Confirmed(time) = clock::step("TIME_OK;9;0;am") else {
            panic!("OK press must finalize the time");
        };
        let reminder_id = rand::thread_rng().gen_range(0..100_000);
        drafts
            .set_time(user_id, &time.to_string(), reminder_id)
            .await
            .unwrap();

        let draft = drafts.current_draft(user_id).await.unwrap().unwrap();
        let completed = draft.completed().unwrap();
        assert_eq!(completed.name, "Meeting");
        assert_eq!(completed.date, "15/06/2024");
        assert_eq!(completed.time, "9:00 am");
        assert!(completed.id < 100_000);
        assert!(draft.extra_info.is_none());
    }

    #[tokio::test]
    async fn cancelling_mid_flow_removes_the_half_built_draft() {
        let dir = tempfile::tempdir().unwrap();
        let drafts = JsonDraftStorage::new(dir.path().join("reminder.json"));
        let user_id = 1;

        drafts.begin_draft(user_id, "Meeting").await.unwrap();
        drafts.set_date(user_id, "15/06/2024").await.unwrap();

        drafts.remove_draft(user_id).await.unwrap();

        assert!(drafts.current_draft(user_id).await.unwrap().is_none());
    }
}
