//! Inline 12-hour clock widget and its transition function.
//!
//! Every interactive button carries the currently displayed (hour, minute,
//! period) triple, so transitions are stateless and idempotent given the
//! token alone.

use std::fmt;

use chrono::{Local, Timelike};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::callback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Am,
    Pm,
}

impl Period {
    fn toggle(self) -> Self {
        match self {
            Period::Am => Period::Pm,
            Period::Pm => Period::Am,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Period::Am => "am",
            Period::Pm => "pm",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "am" => Some(Period::Am),
            "pm" => Some(Period::Pm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
    pub period: Period,
}

impl ClockTime {
    /// Display seed: current time shifted by the user's cached hour offset,
    /// minute rounded down to the nearest multiple of ten.
    pub fn seeded(tz_offset: i32) -> Self {
        let now = Local::now();
        let hour24 = (now.hour() as i32 + tz_offset).rem_euclid(24) as u32;
        Self::from_24h(hour24, now.minute())
    }

    fn from_24h(hour24: u32, minute: u32) -> Self {
        let period = if hour24 >= 12 { Period::Pm } else { Period::Am };
        let hour = match hour24 % 12 {
            0 => 12,
            hour => hour,
        };

        Self {
            hour,
            minute: (minute / 10) * 10,
            period,
        }
    }

    fn token(&self, action: &str) -> String {
        callback::encode(
            action,
            &[
                self.hour.to_string(),
                self.minute.to_string(),
                self.period.as_str().to_string(),
            ],
        )
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02} {}", self.hour, self.minute, self.period.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStep {
    /// OK was pressed; the caller replaces the widget with a confirmation.
    Confirmed(ClockTime),
    /// An arrow or the period toggle; the caller re-renders in place.
    Redraw(ClockTime),
    /// Decorative press, stale token or malformed data. Nothing happens.
    Noop,
}

pub fn render(tz_offset: i32) -> InlineKeyboardMarkup {
    render_at(&ClockTime::seeded(tz_offset))
}

pub fn render_at(time: &ClockTime) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("↑", time.token("HOUR_UP")),
            InlineKeyboardButton::callback("↑", time.token("MIN_UP")),
            InlineKeyboardButton::callback("↑", time.token("PERIOD_TOGGLE")),
        ],
        vec![
            InlineKeyboardButton::callback(time.hour.to_string(), callback::IGNORE),
            InlineKeyboardButton::callback(format!("{:02}", time.minute), callback::IGNORE),
            InlineKeyboardButton::callback(time.period.as_str(), callback::IGNORE),
        ],
        vec![
            InlineKeyboardButton::callback("↓", time.token("HOUR_DOWN")),
            InlineKeyboardButton::callback("↓", time.token("MIN_DOWN")),
            InlineKeyboardButton::callback("↓", time.token("PERIOD_TOGGLE")),
        ],
        vec![InlineKeyboardButton::callback("OK", time.token("TIME_OK"))],
    ])
}

pub fn step(token: &str) -> ClockStep {
    if token == callback::IGNORE {
        return ClockStep::Noop;
    }

    let parts = callback::decode(token);
    if parts.len() < 4 {
        return ClockStep::Noop;
    }

    let (Ok(hour), Ok(minute)) = (parts[1].parse::<u32>(), parts[2].parse::<u32>()) else {
        return ClockStep::Noop;
    };
    let Some(period) = Period::parse(parts[3]) else {
        return ClockStep::Noop;
    };

    let time = ClockTime {
        hour,
        minute,
        period,
    };

    match parts[0] {
        "HOUR_UP" => ClockStep::Redraw(ClockTime {
            hour: time.hour % 12 + 1,
            ..time
        }),
        "HOUR_DOWN" => ClockStep::Redraw(ClockTime {
            hour: (time.hour + 10) % 12 + 1,
            ..time
        }),
        "MIN_UP" => ClockStep::Redraw(ClockTime {
            minute: (time.minute + 10) % 60,
            ..time
        }),
        "MIN_DOWN" => ClockStep::Redraw(ClockTime {
            minute: (time.minute + 50) % 60,
            ..time
        }),
        "PERIOD_TOGGLE" => ClockStep::Redraw(ClockTime {
            period: time.period.toggle(),
            ..time
        }),
        "TIME_OK" => ClockStep::Confirmed(time),
        _ => ClockStep::Noop,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;

    fn clock_time_strategy() -> impl Strategy<Value = ClockTime> {
        (1u32..=12, 0u32..6, prop::bool::ANY).prop_map(|(hour, minute_step, am)| ClockTime {
            hour,
            minute: minute_step * 10,
            period: if am { Period::Am } else { Period::Pm },
        })
    }

    fn advance(time: ClockTime, action: &str) -> ClockTime {
        match step(&time.token(action)) {
            ClockStep::Redraw(next) => next,
            other => panic!("{action} must redraw, got {other:?}"),
        }
    }

    #[test]
    fn ok_finalizes_the_displayed_time() {
        assert_eq!(
            step("TIME_OK;9;0;am"),
            ClockStep::Confirmed(ClockTime {
                hour: 9,
                minute: 0,
                period: Period::Am,
            })
        );
    }

    #[test]
    fn malformed_and_decorative_tokens_are_ignored() {
        assert_eq!(step(callback::IGNORE), ClockStep::Noop);
        assert_eq!(step("HOUR_UP;9;30"), ClockStep::Noop);
        assert_eq!(step("HOUR_UP;x;30;am"), ClockStep::Noop);
        assert_eq!(step("HOUR_UP;9;30;noon"), ClockStep::Noop);
        assert_eq!(step("SOMETHING_ELSE;9;30;am"), ClockStep::Noop);
    }

    #[test]
    fn hour_cycles_through_twelve_and_wraps() {
        let noon = ClockTime {
            hour: 12,
            minute: 0,
            period: Period::Pm,
        };
        assert_eq!(advance(noon, "HOUR_UP").hour, 1);

        let one = ClockTime {
            hour: 1,
            minute: 0,
            period: Period::Pm,
        };
        assert_eq!(advance(one, "HOUR_DOWN").hour, 12);
    }

    #[test]
    fn minutes_step_by_ten_and_wrap() {
        let fifty = ClockTime {
            hour: 9,
            minute: 50,
            period: Period::Am,
        };
        assert_eq!(advance(fifty, "MIN_UP").minute, 0);

        let zero = ClockTime {
            hour: 9,
            minute: 0,
            period: Period::Am,
        };
        assert_eq!(advance(zero, "MIN_DOWN").minute, 50);
    }

    #[test]
    fn seeding_converts_to_twelve_hour_display() {
        assert_eq!(
            ClockTime::from_24h(0, 34),
            ClockTime {
                hour: 12,
                minute: 30,
                period: Period::Am,
            }
        );
        assert_eq!(
            ClockTime::from_24h(12, 5),
            ClockTime {
                hour: 12,
                minute: 0,
                period: Period::Pm,
            }
        );
        assert_eq!(
            ClockTime::from_24h(23, 59),
            ClockTime {
                hour: 11,
                minute: 50,
                period: Period::Pm,
            }
        );
    }

    #[test]
    fn display_matches_the_stored_reminder_format() {
        let time = ClockTime {
            hour: 9,
            minute: 0,
            period: Period::Am,
        };
        assert_eq!(time.to_string(), "9:00 am");
    }

    #[test]
    fn widget_buttons_carry_the_displayed_triple() {
        let time = ClockTime {
            hour: 9,
            minute: 30,
            period: Period::Am,
        };
        let markup = render_at(&time);
        let rows = &markup.inline_keyboard;

        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[0][0].kind,
            InlineKeyboardButtonKind::CallbackData("HOUR_UP;9;30;am".to_string())
        );
        assert_eq!(
            rows[3][0].kind,
            InlineKeyboardButtonKind::CallbackData("TIME_OK;9;30;am".to_string())
        );
        assert_eq!(rows[1][1].text, "30");
    }

    proptest! {
        #[test]
        fn hour_up_has_order_twelve(time in clock_time_strategy()) {
            let mut current = time;
            for _ in 0..12 {
                current = advance(current, "HOUR_UP");
            }
            prop_assert_eq!(current, time);
        }

        #[test]
        fn hour_down_inverts_hour_up(time in clock_time_strategy()) {
            let up = advance(time, "HOUR_UP");
            prop_assert_eq!(advance(up, "HOUR_DOWN"), time);
        }

        #[test]
        fn minute_up_has_order_six(time in clock_time_strategy()) {
            let mut current = time;
            for _ in 0..6 {
                current = advance(current, "MIN_UP");
            }
            prop_assert_eq!(current, time);
        }

        #[test]
        fn period_toggle_is_an_involution(time in clock_time_strategy()) {
            let toggled = advance(time, "PERIOD_TOGGLE");
            prop_assert_ne!(toggled, time);
            prop_assert_eq!(advance(toggled, "PERIOD_TOGGLE"), time);
        }
    }
}
