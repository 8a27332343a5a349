use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::model::{ReminderDraft, UserId};

#[derive(Debug, Error)]
pub enum DraftStorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("no reminder draft for user {0}")]
    NoDraft(UserId),
}

/// Per-user reminder draft persistence. A user has at most one draft;
/// starting a new one discards whatever was in progress.
#[async_trait]
pub trait ReminderDraftStorage: Send + Sync {
    async fn begin_draft(&self, user_id: UserId, name: &str) -> Result<(), DraftStorageError>;
    async fn set_date(&self, user_id: UserId, date: &str) -> Result<(), DraftStorageError>;
    async fn set_time(
        &self,
        user_id: UserId,
        time: &str,
        reminder_id: u32,
    ) -> Result<(), DraftStorageError>;
    async fn set_extra_info(&self, user_id: UserId, info: &str) -> Result<(), DraftStorageError>;
    async fn current_draft(
        &self,
        user_id: UserId,
    ) -> Result<Option<ReminderDraft>, DraftStorageError>;
    async fn remove_draft(&self, user_id: UserId) -> Result<(), DraftStorageError>;
    /// Integer hour offset used only to seed the time picker. Independent
    /// of the IANA zone kept in the tip schedule table.
    async fn timezone_offset(&self, user_id: UserId) -> Result<i32, DraftStorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DraftDocument {
    reminders: HashMap<String, UserReminders>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserReminders {
    #[serde(default)]
    timezone_offset: i32,
    #[serde(default)]
    draft: Option<ReminderDraft>,
}

/// Whole-document read-modify-write over a single JSON file. The file is
/// recreated with an empty structure when absent or unparsable.
pub struct JsonDraftStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonDraftStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> DraftDocument {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|error| {
                log::warn!(
                    "Recreating {} after a parse failure: {error}",
                    self.path.display()
                );
                DraftDocument::default()
            }),
            Err(_) => DraftDocument::default(),
        }
    }

    async fn store(&self, document: &DraftDocument) -> Result<(), DraftStorageError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn update_draft(
        &self,
        user_id: UserId,
        apply: impl FnOnce(&mut ReminderDraft) + Send,
    ) -> Result<(), DraftStorageError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await;
        let draft = document
            .reminders
            .get_mut(&user_id.to_string())
            .and_then(|entry| entry.draft.as_mut())
            .ok_or(DraftStorageError::NoDraft(user_id))?;

        apply(draft);
        self.store(&document).await
    }
}

#[async_trait]
impl ReminderDraftStorage for JsonDraftStorage {
    async fn begin_draft(&self, user_id: UserId, name: &str) -> Result<(), DraftStorageError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await;
        let entry = document
            .reminders
            .entry(user_id.to_string())
            .or_default();
        entry.draft = Some(ReminderDraft::named(name));
        self.store(&document).await
    }

    async fn set_date(&self, user_id: UserId, date: &str) -> Result<(), DraftStorageError> {
        let date = date.to_string();
        self.update_draft(user_id, move |draft| draft.date = Some(date))
            .await
    }

    async fn set_time(
        &self,
        user_id: UserId,
        time: &str,
        reminder_id: u32,
    ) -> Result<(), DraftStorageError> {
        let time = time.to_string();
        self.update_draft(user_id, move |draft| {
            draft.time = Some(time);
            draft.id = Some(reminder_id);
        })
        .await
    }

    async fn set_extra_info(&self, user_id: UserId, info: &str) -> Result<(), DraftStorageError> {
        let info = info.to_string();
        self.update_draft(user_id, move |draft| draft.extra_info = Some(info))
            .await
    }

    async fn current_draft(
        &self,
        user_id: UserId,
    ) -> Result<Option<ReminderDraft>, DraftStorageError> {
        let _guard = self.lock.lock().await;
        let document = self.load().await;
        Ok(document
            .reminders
            .get(&user_id.to_string())
            .and_then(|entry| entry.draft.clone()))
    }

    async fn remove_draft(&self, user_id: UserId) -> Result<(), DraftStorageError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await;
        if let Some(entry) = document.reminders.get_mut(&user_id.to_string()) {
            entry.draft = None;
            self.store(&document).await?;
        }
        Ok(())
    }

    async fn timezone_offset(&self, user_id: UserId) -> Result<i32, DraftStorageError> {
        let _guard = self.lock.lock().await;
        let document = self.load().await;
        Ok(document
            .reminders
            .get(&user_id.to_string())
            .map(|entry| entry.timezone_offset)
            .unwrap_or(0))
    }
}
