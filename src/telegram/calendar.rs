//! Inline month-calendar widget and its transition function.

use chrono::{Datelike, Local, NaiveDate};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::callback;

const WEEKDAY_LABELS: [&str; 7] = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarStep {
    /// A day was picked; the caller replaces the widget with a confirmation.
    Picked(NaiveDate),
    /// Navigation; the caller re-renders the widget for this month in place.
    Month { year: i32, month: u32 },
    /// Decorative press, stale token or malformed data. Nothing happens.
    Noop,
}

pub fn render(year: Option<i32>, month: Option<u32>) -> InlineKeyboardMarkup {
    let today = Local::now().date_naive();
    let year = year.unwrap_or_else(|| today.year());
    let month = month.unwrap_or_else(|| today.month());

    let header = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| first.format("%B %Y").to_string())
        .unwrap_or_default();

    let mut keyboard = vec![
        vec![InlineKeyboardButton::callback(header, callback::IGNORE)],
        WEEKDAY_LABELS
            .iter()
            .map(|label| InlineKeyboardButton::callback(*label, callback::IGNORE))
            .collect(),
    ];

    for week in month_weeks(year, month) {
        let row = week
            .iter()
            .map(|&day| {
                if day == 0 {
                    InlineKeyboardButton::callback(" ", callback::IGNORE)
                } else {
                    let token = callback::encode(
                        "DAY",
                        &[year.to_string(), month.to_string(), day.to_string()],
                    );
                    InlineKeyboardButton::callback(day.to_string(), token)
                }
            })
            .collect();
        keyboard.push(row);
    }

    let nav_args = [year.to_string(), month.to_string()];
    keyboard.push(vec![
        InlineKeyboardButton::callback("<", callback::encode("PREV_MONTH", &nav_args)),
        InlineKeyboardButton::callback(" ", callback::IGNORE),
        InlineKeyboardButton::callback(">", callback::encode("NEXT_MONTH", &nav_args)),
    ]);

    InlineKeyboardMarkup::new(keyboard)
}

pub fn step(token: &str) -> CalendarStep {
    if token == callback::IGNORE {
        return CalendarStep::Noop;
    }

    let parts = callback::decode(token);
    if parts.len() < 3 {
        return CalendarStep::Noop;
    }

    let (Ok(year), Ok(month)) = (parts[1].parse::<i32>(), parts[2].parse::<u32>()) else {
        return CalendarStep::Noop;
    };

    match parts[0] {
        "DAY" if parts.len() >= 4 => parts[3]
            .parse::<u32>()
            .ok()
            .and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
            .map_or(CalendarStep::Noop, CalendarStep::Picked),
        "PREV_MONTH" => {
            let (year, month) = if month == 1 {
                (year - 1, 12)
            } else {
                (year, month - 1)
            };
            CalendarStep::Month { year, month }
        }
        "NEXT_MONTH" => {
            let (year, month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            CalendarStep::Month { year, month }
        }
        _ => CalendarStep::Noop,
    }
}

/// Monday-first week rows; zero marks a padding cell outside the month.
fn month_weeks(year: i32, month: u32) -> Vec<[u32; 7]> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut weeks = Vec::new();
    let mut week = [0u32; 7];
    let mut slot = first.weekday().num_days_from_monday() as usize;

    for day in 1..=days_in_month(year, month) {
        week[slot] = day;
        slot += 1;
        if slot == 7 {
            weeks.push(week);
            week = [0; 7];
            slot = 0;
        }
    }
    if slot > 0 {
        weeks.push(week);
    }

    weeks
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(0, |last| last.day())
}
