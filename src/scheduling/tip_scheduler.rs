use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::storage::{TipSchedule, TipScheduleStorage, UserId};
use crate::tips;

use super::delivery::TipDeliveryChannel;

const CANCEL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[async_trait]
pub trait TipScheduler: Send + Sync {
    /// Idempotent replace: any job already registered for `user_id` is
    /// cancelled before the new one is persisted and started. An unknown
    /// timezone falls back to the configured default zone; the stored row
    /// keeps the name the caller supplied.
    async fn subscribe(
        &self,
        user_id: UserId,
        hour: u32,
        minute: u32,
        timezone_name: &str,
    ) -> anyhow::Result<()>;

    /// Re-registers every stored schedule without re-writing storage.
    /// A row that fails to restore is logged and skipped; the rest are
    /// unaffected.
    async fn restore_all(&self) -> anyhow::Result<()>;
}

struct ScheduledTask {
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl ScheduledTask {
    fn new(task_handle: JoinHandle<()>, cancellation_token: CancellationToken) -> Self {
        Self {
            task_handle,
            cancellation_token,
        }
    }

    async fn cancel(self, timeout: std::time::Duration) {
        self.cancellation_token.cancel();
        let cancel_with_timeout = time::timeout(timeout, self.task_handle);
        let _ = cancel_with_timeout.await;
    }
}

pub struct DailyTipScheduler {
    tasks: Mutex<HashMap<UserId, ScheduledTask>>,
    storage: Arc<dyn TipScheduleStorage>,
    delivery: Arc<dyn TipDeliveryChannel>,
    default_timezone: Tz,
}

impl DailyTipScheduler {
    pub fn new(
        storage: Arc<dyn TipScheduleStorage>,
        delivery: Arc<dyn TipDeliveryChannel>,
        default_timezone: Tz,
    ) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            storage,
            delivery,
            default_timezone,
        }
    }

    pub async fn active_jobs(&self) -> usize {
        self.tasks.lock().await.len()
    }

    fn resolve_timezone(&self, user_id: UserId, timezone_name: &str) -> Tz {
        timezone_name.parse().unwrap_or_else(|_| {
            log::warn!(
                "Unknown timezone {timezone_name} for user {user_id}, using {}",
                self.default_timezone
            );
            self.default_timezone
        })
    }

    async fn register(&self, user_id: UserId, fire_at: NaiveTime, timezone: Tz) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.remove(&user_id) {
            task.cancel(CANCEL_TIMEOUT).await;
        }
        tasks.insert(user_id, self.spawn_tip_task(user_id, fire_at, timezone));
    }

    fn spawn_tip_task(&self, user_id: UserId, fire_at: NaiveTime, timezone: Tz) -> ScheduledTask {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.child_token();
        let storage = Arc::clone(&self.storage);
        let delivery = Arc::clone(&self.delivery);
        let default_timezone = self.default_timezone;

        let task_handle = tokio::spawn(async move {
            loop {
                let delay = get_target_delay(fire_at, timezone, Utc::now())
                    .to_std()
                    .expect("The target delay is always in the future.");

                tokio::select! {
                    _ = task_token.cancelled() => {
                        log::info!("Tip job for user {user_id} cancelled");
                        break;
                    },
                    _ = tokio::time::sleep(delay) => {
                        deliver_daily_tip(
                            storage.as_ref(),
                            delivery.as_ref(),
                            default_timezone,
                            user_id,
                        )
                        .await;
                    }
                }
            }
        });

        ScheduledTask::new(task_handle, cancellation_token)
    }
}

#[async_trait]
impl TipScheduler for DailyTipScheduler {
    async fn subscribe(
        &self,
        user_id: UserId,
        hour: u32,
        minute: u32,
        timezone_name: &str,
    ) -> anyhow::Result<()> {
        let fire_at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid wall-clock time {hour}:{minute}"))?;
        let timezone = self.resolve_timezone(user_id, timezone_name);

        self.storage
            .upsert(&TipSchedule {
                user_id,
                hour,
                minute,
                timezone: timezone_name.to_string(),
            })
            .await?;

        self.register(user_id, fire_at, timezone).await;
        log::info!("Scheduled daily tip for user {user_id} at {hour:02}:{minute:02} {timezone_name}");
        Ok(())
    }

    async fn restore_all(&self) -> anyhow::Result<()> {
        let schedules = self.storage.get_all().await?;
        for schedule in schedules {
            let user_id = schedule.user_id;
            let timezone = match schedule.timezone.parse::<Tz>() {
                Ok(timezone) => timezone,
                Err(_) => {
                    log::error!(
                        "Error restoring schedule for user {user_id}: unknown timezone {}",
                        schedule.timezone
                    );
                    continue;
                }
            };
            let Some(fire_at) = NaiveTime::from_hms_opt(schedule.hour, schedule.minute, 0) else {
                log::error!(
                    "Error restoring schedule for user {user_id}: invalid time {}:{}",
                    schedule.hour,
                    schedule.minute
                );
                continue;
            };

            self.register(user_id, fire_at, timezone).await;
            log::info!(
                "Restored schedule for user {user_id} at {:02}:{:02} {}",
                schedule.hour,
                schedule.minute,
                schedule.timezone
            );
        }
        Ok(())
    }
}

/// One firing. Re-reads the schedule row so a replaced or missing row is
/// tolerated; a failed send is logged and must not tear the job down.
async fn deliver_daily_tip(
    storage: &dyn TipScheduleStorage,
    delivery: &dyn TipDeliveryChannel,
    default_timezone: Tz,
    user_id: UserId,
) {
    let schedule = match storage.get(user_id).await {
        Ok(Some(schedule)) => schedule,
        Ok(None) => return,
        Err(error) => {
            log::error!("Could not read tip schedule for user {user_id}: {error}");
            return;
        }
    };

    let timezone = schedule.timezone.parse::<Tz>().unwrap_or(default_timezone);
    let day_of_year = Utc::now().with_timezone(&timezone).ordinal();
    let tip = tips::tip_of_day(day_of_year);

    if let Err(error) = delivery.send_tip(user_id, tip).await {
        log::error!("Failed to deliver tip to user {user_id}: {error}");
    }
}

/// Delay until the next `fire_at` on the subscriber's wall clock. A target
/// less than ten seconds away rolls over to tomorrow so a job that just
/// fired re-arms for the next day.
fn get_target_delay(fire_at: NaiveTime, timezone: Tz, now: DateTime<Utc>) -> TimeDelta {
    let local_now = now.with_timezone(&timezone);
    let max_delta = TimeDelta::new(10, 0).expect("This is always in bounds.");
    let delta = fire_at - local_now.time();

    let today = local_now.date_naive();
    let target_date = if delta <= max_delta {
        today
            .checked_add_signed(TimeDelta::days(1))
            .expect("Not realistic to overflow")
    } else {
        today
    };

    let target = target_date.and_time(fire_at);
    // A DST gap can make the local target nonexistent; the next valid hour
    // is close enough for a daily job.
    let target_utc = timezone
        .from_local_datetime(&target)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(target + TimeDelta::hours(1)))
                .earliest()
        })
        .map(|target| target.to_utc())
        .unwrap_or(now + TimeDelta::days(1));

    target_utc - now
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::{NaiveDateTime, Timelike};
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;

    use crate::storage::InMemoryTipScheduleStorage;

    use super::*;

    struct TestDeliveryChannel {
        sent: Arc<StdMutex<Vec<(UserId, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl TipDeliveryChannel for TestDeliveryChannel {
        async fn send_tip(&self, user_id: UserId, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((user_id, text.to_string()));
            if self.fail {
                anyhow::bail!("gateway unavailable");
            }
            Ok(())
        }
    }

    struct TestContext {
        sent: Arc<StdMutex<Vec<(UserId, String)>>>,
        storage: Arc<InMemoryTipScheduleStorage>,
        scheduler: DailyTipScheduler,
    }

    fn test_context(fail_delivery: bool) -> TestContext {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let storage = Arc::new(InMemoryTipScheduleStorage::new());
        let delivery = Arc::new(TestDeliveryChannel {
            sent: Arc::clone(&sent),
            fail: fail_delivery,
        });
        let scheduler = DailyTipScheduler::new(
            Arc::clone(&storage) as Arc<dyn TipScheduleStorage>,
            delivery,
            chrono_tz::Tz::Europe__Moscow,
        );

        TestContext {
            sent,
            storage,
            scheduler,
        }
    }

    /// Wall-clock (hour, minute) roughly `hours_ahead` hours from now in
    /// UTC, so computed delays stay far away from the ten-second rollover
    /// guard.
    fn upcoming_time(hours_ahead: i64) -> (u32, u32) {
        let target = Utc::now() + TimeDelta::hours(hours_ahead);
        (target.hour(), target.minute())
    }

    async fn wait(hours: u64, slack_secs: u64) {
        tokio::time::sleep(std::time::Duration::from_secs(hours * 3600 + slack_secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribing_replaces_the_previous_job() {
        let ctx = test_context(false);
        let (h1, m1) = upcoming_time(1);
        let (h2, m2) = upcoming_time(2);

        ctx.scheduler.subscribe(1, h1, m1, "UTC").await.unwrap();
        ctx.scheduler.subscribe(1, h2, m2, "UTC").await.unwrap();

        assert_eq!(ctx.scheduler.active_jobs().await, 1);
        let stored = ctx.storage.get(1).await.unwrap().unwrap();
        assert_eq!((stored.hour, stored.minute), (h2, m2));

        // Past both target times: only the replacement job may fire.
        wait(2, 90).await;
        assert_eq!(ctx.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn firing_reads_the_schedule_and_sends_a_tip() {
        let ctx = test_context(false);
        let (hour, minute) = upcoming_time(1);

        ctx.scheduler.subscribe(7, hour, minute, "UTC").await.unwrap();
        wait(1, 90).await;

        let sent = ctx.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (user_id, text) = &sent[0];
        assert_eq!(*user_id, 7);
        assert!(tips::TIPS.contains(&text.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_failure_does_not_kill_the_job() {
        let ctx = test_context(true);
        let (hour, minute) = upcoming_time(1);

        ctx.scheduler.subscribe(1, hour, minute, "UTC").await.unwrap();

        // chrono's clock is frozen while tokio time is paused, so the loop
        // re-arms with roughly the same delay after every firing; two
        // windows mean two attempts if the first failure was swallowed.
        wait(1, 90).await;
        wait(1, 90).await;

        assert!(ctx.sent.lock().unwrap().len() >= 2);
        assert_eq!(ctx.scheduler.active_jobs().await, 1);
    }

    #[tokio::test]
    async fn unknown_timezone_falls_back_but_the_row_keeps_the_given_name() {
        let ctx = test_context(false);

        ctx.scheduler
            .subscribe(3, 9, 30, "Atlantis/Underwater")
            .await
            .unwrap();

        assert_eq!(ctx.scheduler.active_jobs().await, 1);
        let stored = ctx.storage.get(3).await.unwrap().unwrap();
        assert_eq!(stored.timezone, "Atlantis/Underwater");
    }

    #[tokio::test]
    async fn restore_registers_only_rows_with_a_valid_timezone() {
        let ctx = test_context(false);
        ctx.storage
            .upsert(&TipSchedule {
                user_id: 1,
                hour: 9,
                minute: 30,
                timezone: "Europe/Moscow".to_string(),
            })
            .await
            .unwrap();
        ctx.storage
            .upsert(&TipSchedule {
                user_id: 2,
                hour: 12,
                minute: 0,
                timezone: "Nowhere/Invalid".to_string(),
            })
            .await
            .unwrap();

        ctx.scheduler.restore_all().await.unwrap();

        assert_eq!(ctx.scheduler.active_jobs().await, 1);
    }

    #[tokio::test]
    async fn firing_without_a_schedule_row_is_a_noop() {
        let ctx = test_context(false);

        deliver_daily_tip(
            ctx.storage.as_ref(),
            &TestDeliveryChannel {
                sent: Arc::clone(&ctx.sent),
                fail: false,
            },
            chrono_tz::Tz::UTC,
            99,
        )
        .await;

        assert!(ctx.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn when_firing_time_is_yet_to_come_target_delay_is_less_than_a_day() {
        let now = Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap();
        let fire_at = NaiveTime::from_hms_opt(13, 0, 0).unwrap();

        let delay = get_target_delay(fire_at, chrono_tz::Tz::UTC, now);

        assert_eq!(delay.num_hours(), 1);
    }

    #[test]
    fn when_firing_time_has_passed_target_delay_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap();
        let fire_at = NaiveTime::from_hms_opt(11, 0, 0).unwrap();

        let delay = get_target_delay(fire_at, chrono_tz::Tz::UTC, now);

        assert_eq!(delay.num_hours(), 23);
    }

    #[test]
    fn target_delay_is_computed_on_the_subscriber_wall_clock() {
        // 12:00 UTC is 15:00 in Moscow.
        let now = Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap();

        let ahead = get_target_delay(
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            chrono_tz::Tz::Europe__Moscow,
            now,
        );
        assert_eq!(ahead.num_hours(), 1);

        let behind = get_target_delay(
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            chrono_tz::Tz::Europe__Moscow,
            now,
        );
        assert_eq!(behind.num_hours(), 23);
    }

    proptest! {
        #[test]
        fn target_delay_lands_on_the_requested_time(
            now in arb::<NaiveDateTime>(),
            fire_at in arb::<NaiveTime>()
        ) {
            let fire_at = fire_at.with_nanosecond(0).unwrap();
            let now = Utc.from_utc_datetime(&now.with_nanosecond(0).unwrap());

            let delay = get_target_delay(fire_at, chrono_tz::Tz::UTC, now);
            let target = now + delay;

            prop_assert!(target > now, "target must be in the future");
            prop_assert_eq!(target.time(), fire_at);
            prop_assert!(delay.num_days() <= 1, "delay must be a day or less");
        }
    }
}
