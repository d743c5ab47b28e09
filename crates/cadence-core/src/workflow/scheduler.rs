//! Periodic jobs behind schedule and condition triggers.
//!
//! Provides:
//! - Fixed-interval jobs (`schedule` triggers with `interval_ms`)
//! - Once-per-minute cron jobs evaluated against the local wall clock
//! - Condition poll jobs (`condition` triggers)
//! - Per-workflow teardown through child `CancellationToken`s
//!
//! Jobs are keyed by `(workflow_id, trigger_id)`; registering the same pair
//! twice is a no-op, so deactivate/reactivate cycles never stack timers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike, Utc};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cron::{CronError, CronExpression};

/// Callback invoked each time a job fires.
pub type JobCallback = Arc<dyn Fn(Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

/// What drives a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Interval { period_ms: u64 },
    Cron { expression: String },
    ConditionPoll { period_ms: u64 },
}

/// Optional `[start_at, end_at]` bounds for schedule triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleWindow {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl ScheduleWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_at.is_none_or(|start| at >= start) && self.end_at.is_none_or(|end| at <= end)
    }
}

/// A registered job.
#[derive(Debug)]
struct ScheduledJob {
    trigger_id: String,
    kind: JobKind,
    token: CancellationToken,
}

/// Owns every periodic trigger job in the process.
pub struct JobScheduler {
    /// workflow_id -> jobs owned by that workflow.
    jobs: DashMap<Uuid, Vec<ScheduledJob>>,
    root: CancellationToken,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            root: CancellationToken::new(),
        }
    }

    /// Launch the workflow every `period`, skipping ticks outside `window`.
    pub fn schedule_interval(
        &self,
        workflow_id: Uuid,
        trigger_id: &str,
        period: Duration,
        window: ScheduleWindow,
        callback: JobCallback,
    ) -> bool {
        let period = period.max(Duration::from_millis(1));
        let kind = JobKind::Interval {
            period_ms: duration_ms(period),
        };
        self.register(workflow_id, trigger_id, kind, move |token| async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if window.contains(Utc::now()) {
                            tracing::debug!(%workflow_id, "interval trigger fired");
                            callback(workflow_id).await;
                        }
                    }
                }
            }
        })
    }

    /// Check `expression` at the start of every minute and launch on a match.
    ///
    /// An unparseable expression is rejected here and never registered.
    pub fn schedule_cron(
        &self,
        workflow_id: Uuid,
        trigger_id: &str,
        expression: &str,
        window: ScheduleWindow,
        callback: JobCallback,
    ) -> Result<bool, CronError> {
        let cron = CronExpression::parse(expression)?;
        let kind = JobKind::Cron {
            expression: expression.to_string(),
        };
        Ok(self.register(workflow_id, trigger_id, kind, move |token| async move {
            let mut last_minute: Option<i64> = None;
            loop {
                let wait = until_next_minute(&Local::now());
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                let now = Local::now();
                let minute = now.timestamp().div_euclid(60);
                if last_minute == Some(minute) {
                    continue;
                }
                if cron.matches(&now) && window.contains(now.with_timezone(&Utc)) {
                    last_minute = Some(minute);
                    tracing::debug!(%workflow_id, %now, "cron trigger fired");
                    callback(workflow_id).await;
                }
            }
        }))
    }

    /// Invoke `callback` every `period`; the callback decides whether to launch.
    pub fn schedule_condition_poll(
        &self,
        workflow_id: Uuid,
        trigger_id: &str,
        period: Duration,
        callback: JobCallback,
    ) -> bool {
        let period = period.max(Duration::from_millis(1));
        let kind = JobKind::ConditionPoll {
            period_ms: duration_ms(period),
        };
        self.register(workflow_id, trigger_id, kind, move |token| async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => callback(workflow_id).await,
                }
            }
        })
    }

    fn register<F, Fut>(&self, workflow_id: Uuid, trigger_id: &str, kind: JobKind, job: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut entry = self.jobs.entry(workflow_id).or_default();
        if entry.iter().any(|j| j.trigger_id == trigger_id) {
            tracing::debug!(%workflow_id, trigger_id, "job already scheduled");
            return false;
        }

        let token = self.root.child_token();
        tokio::spawn(job(token.clone()));
        tracing::info!(%workflow_id, trigger_id, ?kind, "job scheduled");
        entry.push(ScheduledJob {
            trigger_id: trigger_id.to_string(),
            kind,
            token,
        });
        true
    }

    /// Stop every job owned by `workflow_id`. Returns how many were stopped.
    pub fn cancel_workflow_jobs(&self, workflow_id: Uuid) -> usize {
        let Some((_, jobs)) = self.jobs.remove(&workflow_id) else {
            return 0;
        };
        for job in &jobs {
            job.token.cancel();
        }
        if !jobs.is_empty() {
            tracing::info!(%workflow_id, count = jobs.len(), "scheduled jobs cancelled");
        }
        jobs.len()
    }

    /// Kinds of the jobs owned by `workflow_id`.
    pub fn jobs_for(&self, workflow_id: Uuid) -> Vec<JobKind> {
        self.jobs
            .get(&workflow_id)
            .map(|jobs| jobs.iter().map(|j| j.kind.clone()).collect())
            .unwrap_or_default()
    }

    pub fn job_count(&self, workflow_id: Uuid) -> usize {
        self.jobs.get(&workflow_id).map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn total_jobs(&self) -> usize {
        self.jobs.iter().map(|entry| entry.value().len()).sum()
    }

    /// Stop everything.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.jobs.clear();
        tracing::info!("job scheduler stopped");
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Time left until the next wall-clock minute starts.
fn until_next_minute<T: Timelike>(now: &T) -> Duration {
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    let left = Duration::from_secs(60).saturating_sub(into_minute);
    if left.is_zero() {
        Duration::from_secs(60)
    } else {
        left
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback() -> (JobCallback, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let cb: JobCallback = Arc::new(move |_id| -> BoxFuture<'static, ()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        });
        (cb, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_fires_each_period() {
        let scheduler = JobScheduler::new();
        let (cb, fired) = counting_callback();
        let wf = Uuid::now_v7();

        assert!(scheduler.schedule_interval(wf, "t1", Duration::from_secs(10), ScheduleWindow::default(), cb));
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_trigger_registered_once() {
        let scheduler = JobScheduler::new();
        let (cb, fired) = counting_callback();
        let wf = Uuid::now_v7();

        for _ in 0..3 {
            scheduler.schedule_interval(wf, "t1", Duration::from_secs(10), ScheduleWindow::default(), cb.clone());
        }
        assert_eq!(scheduler.job_count(wf), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_only_touches_one_workflow() {
        let scheduler = JobScheduler::new();
        let (cb_a, fired_a) = counting_callback();
        let (cb_b, fired_b) = counting_callback();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        scheduler.schedule_interval(a, "t", Duration::from_secs(1), ScheduleWindow::default(), cb_a.clone());
        scheduler.schedule_condition_poll(a, "c", Duration::from_secs(1), cb_a);
        scheduler.schedule_interval(b, "t", Duration::from_secs(1), ScheduleWindow::default(), cb_b);
        assert_eq!(scheduler.total_jobs(), 3);

        assert_eq!(scheduler.cancel_workflow_jobs(a), 2);
        assert_eq!(scheduler.cancel_workflow_jobs(a), 0);
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(fired_a.load(Ordering::SeqCst), 0);
        assert_eq!(fired_b.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.jobs_for(b), vec![JobKind::Interval { period_ms: 1000 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_skips_ticks() {
        let scheduler = JobScheduler::new();
        let (cb, fired) = counting_callback();
        let window = ScheduleWindow {
            start_at: None,
            end_at: Some(Utc::now() - chrono::Duration::hours(1)),
        };
        scheduler.schedule_interval(Uuid::now_v7(), "t", Duration::from_secs(1), window, cb);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_cron_not_registered() {
        let scheduler = JobScheduler::new();
        let (cb, _) = counting_callback();
        let wf = Uuid::now_v7();
        assert!(scheduler
            .schedule_cron(wf, "t", "* * * *", ScheduleWindow::default(), cb.clone())
            .is_err());
        assert_eq!(scheduler.job_count(wf), 0);

        assert!(scheduler
            .schedule_cron(wf, "t", "*/5 * * * *", ScheduleWindow::default(), cb)
            .unwrap());
        assert_eq!(
            scheduler.jobs_for(wf),
            vec![JobKind::Cron { expression: "*/5 * * * *".to_string() }]
        );
        scheduler.shutdown();
        assert_eq!(scheduler.total_jobs(), 0);
    }

    #[test]
    fn test_until_next_minute() {
        let t = NaiveTime::from_hms_milli_opt(10, 4, 45, 500).unwrap();
        assert_eq!(until_next_minute(&t), Duration::from_millis(14_500));
        let t = NaiveTime::from_hms_opt(10, 5, 0).unwrap();
        assert_eq!(until_next_minute(&t), Duration::from_secs(60));
    }

    #[test]
    fn test_window_bounds() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let window = ScheduleWindow {
            start_at: Some(start),
            end_at: Some(end),
        };
        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(start - chrono::Duration::seconds(1)));
        assert!(!window.contains(end + chrono::Duration::seconds(1)));
        assert!(ScheduleWindow::default().contains(start));
    }
}
