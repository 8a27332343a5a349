use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;

use super::model::{TipSchedule, UserId};

#[async_trait]
pub trait TipScheduleStorage: Send + Sync {
    async fn upsert(&self, schedule: &TipSchedule) -> anyhow::Result<()>;
    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<TipSchedule>>;
    async fn get_all(&self) -> anyhow::Result<Vec<TipSchedule>>;
}

pub struct SqliteTipScheduleStorage {
    pool: SqlitePool,
}

impl SqliteTipScheduleStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                hour INTEGER NOT NULL,
                minute INTEGER NOT NULL,
                timezone TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn schedule_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TipSchedule, sqlx::Error> {
    Ok(TipSchedule {
        user_id: row.try_get("user_id")?,
        hour: row.try_get("hour")?,
        minute: row.try_get("minute")?,
        timezone: row.try_get("timezone")?,
    })
}

#[async_trait]
impl TipScheduleStorage for SqliteTipScheduleStorage {
    async fn upsert(&self, schedule: &TipSchedule) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO users (user_id, hour, minute, timezone) VALUES (?, ?, ?, ?)",
        )
        .bind(schedule.user_id)
        .bind(schedule.hour)
        .bind(schedule.minute)
        .bind(&schedule.timezone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<TipSchedule>> {
        let row = sqlx::query("SELECT user_id, hour, minute, timezone FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(schedule_from_row).transpose().map_err(Into::into)
    }

    async fn get_all(&self) -> anyhow::Result<Vec<TipSchedule>> {
        let rows = sqlx::query("SELECT user_id, hour, minute, timezone FROM users")
            .fetch_all(&self.pool)
            .await?;

        let mut schedules = Vec::with_capacity(rows.len());
        for row in &rows {
            schedules.push(schedule_from_row(row)?);
        }
        Ok(schedules)
    }
}

pub struct InMemoryTipScheduleStorage {
    store: RwLock<HashMap<UserId, TipSchedule>>,
}

impl InMemoryTipScheduleStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTipScheduleStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TipScheduleStorage for InMemoryTipScheduleStorage {
    async fn upsert(&self, schedule: &TipSchedule) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store.insert(schedule.user_id, schedule.clone());
        Ok(())
    }

    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<TipSchedule>> {
        let store = self.store.read().await;
        Ok(store.get(&user_id).cloned())
    }

    async fn get_all(&self) -> anyhow::Result<Vec<TipSchedule>> {
        let store = self.store.read().await;
        Ok(store.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(user_id: UserId, hour: u32, minute: u32) -> TipSchedule {
        TipSchedule {
            user_id,
            hour,
            minute,
            timezone: "Europe/Moscow".to_string(),
        }
    }

    async fn sqlite_storage() -> SqliteTipScheduleStorage {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = SqliteTipScheduleStorage::new(pool);
        storage.init_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn upsert_replaces_the_existing_row() {
        let storage = sqlite_storage().await;

        storage.upsert(&schedule(1, 9, 30)).await.unwrap();
        storage.upsert(&schedule(1, 14, 0)).await.unwrap();

        let stored = storage.get(1).await.unwrap().unwrap();
        assert_eq!((stored.hour, stored.minute), (14, 0));
        assert_eq!(storage.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_all_scans_every_row() {
        let storage = sqlite_storage().await;

        storage.upsert(&schedule(1, 8, 0)).await.unwrap();
        storage.upsert(&schedule(2, 18, 0)).await.unwrap();

        let mut user_ids: Vec<_> = storage
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.user_id)
            .collect();
        user_ids.sort_unstable();
        assert_eq!(user_ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn missing_row_reads_as_none() {
        let storage = sqlite_storage().await;
        assert!(storage.get(404).await.unwrap().is_none());
    }
}
