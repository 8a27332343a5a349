mod draft_storage;
mod model;
mod schedule_storage;

pub use draft_storage::{DraftStorageError, JsonDraftStorage, ReminderDraftStorage};
pub use model::{CompletedReminder, ReminderDraft, TipSchedule, UserId};
pub use schedule_storage::{
    InMemoryTipScheduleStorage, SqliteTipScheduleStorage, TipScheduleStorage,
};
