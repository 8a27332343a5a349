use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// One row of the tip schedule table. A user has at most one row; it is
/// replaced wholesale on re-subscription and never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipSchedule {
    pub user_id: UserId,
    pub hour: u32,
    pub minute: u32,
    /// IANA zone name as the user picked it. Validated at scheduling time,
    /// not here.
    pub timezone: String,
}

/// An in-progress reminder, built field-by-field across dialogue turns.
/// Only `name` is guaranteed to be present; the rest fills in as the flow
/// advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<String>,
}

impl ReminderDraft {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            date: None,
            time: None,
            id: None,
            extra_info: None,
        }
    }

    /// The committed view of the draft, available once every mandatory
    /// field has been written.
    pub fn completed(&self) -> Option<CompletedReminder> {
        Some(CompletedReminder {
            name: self.name.clone(),
            date: self.date.clone()?,
            time: self.time.clone()?,
            id: self.id?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedReminder {
    pub name: String,
    pub date: String,
    pub time: String,
    pub id: u32,
}
