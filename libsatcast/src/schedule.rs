//! Cron-driven dispatch of tasks
//!
//! Expressions use the six-field form with seconds and are evaluated in UTC.
//! Cron syntax cannot say "last day of the month" or "every N days since the
//! epoch", so those jobs fire on a wider expression and a [`Gate`] decides
//! at fire time.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::DonationConfig;
use crate::error::{Result, SatcastError};
use crate::tasks::{Task, TaskOrchestrator};

const MS_PER_DAY: i64 = 86_400_000;

/// Longest single sleep before re-checking the shutdown flag
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

/// Whole days since the Unix epoch is a multiple of `interval_days`
pub fn is_donation_day(now: DateTime<Utc>, interval_days: u64) -> bool {
    if interval_days == 0 {
        return false;
    }
    let days = now.timestamp_millis().div_euclid(MS_PER_DAY);
    days.rem_euclid(interval_days as i64) == 0
}

/// Tomorrow falls in a different month
pub fn is_last_day_of_month(now: DateTime<Utc>) -> bool {
    (now + ChronoDuration::days(1)).month() != now.month()
}

/// Fire-time condition on top of the cron expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Always,
    LastDayOfMonth,
    DonationDay { enabled: bool, interval_days: u64 },
}

impl Gate {
    pub fn allows(&self, now: DateTime<Utc>) -> bool {
        match *self {
            Gate::Always => true,
            Gate::LastDayOfMonth => is_last_day_of_month(now),
            Gate::DonationDay {
                enabled,
                interval_days,
            } => enabled && is_donation_day(now, interval_days),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub task: Task,
    pub expression: String,
    pub gate: Gate,
    schedule: cron::Schedule,
}

impl ScheduledJob {
    pub fn new(task: Task, expression: &str, gate: Gate) -> Result<Self> {
        let schedule = cron::Schedule::from_str(expression).map_err(|e| {
            SatcastError::InvalidInput(format!(
                "Invalid cron expression '{}' for {}: {}",
                expression, task, e
            ))
        })?;
        Ok(Self {
            task,
            expression: expression.to_string(),
            gate,
            schedule,
        })
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// The bot's fixed timetable
pub fn default_jobs(donation: &DonationConfig) -> Result<Vec<ScheduledJob>> {
    Ok(vec![
        ScheduledJob::new(Task::Bitcoin1hPriceUpdate, "0 0 * * * *", Gate::Always)?,
        ScheduledJob::new(Task::Bitcoin24hPriceUpdate, "0 0 */12 * * *", Gate::Always)?,
        ScheduledJob::new(Task::FearGreedIndex, "0 0 0 * * *", Gate::Always)?,
        ScheduledJob::new(
            Task::DonationReminder,
            "0 5 0 * * *",
            Gate::DonationDay {
                enabled: donation.enabled,
                interval_days: donation.interval_days,
            },
        )?,
        ScheduledJob::new(
            Task::BitcoinMonthlyReturns,
            "0 0 12 28-31 * *",
            Gate::LastDayOfMonth,
        )?,
    ])
}

pub struct Scheduler {
    orchestrator: Arc<TaskOrchestrator>,
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<TaskOrchestrator>, jobs: Vec<ScheduledJob>) -> Self {
        Self { orchestrator, jobs }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Earliest fire time after `after` and the jobs due at that instant
    pub fn next_due(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<&ScheduledJob>)> {
        let at = self.jobs.iter().filter_map(|j| j.next_after(after)).min()?;
        let due = self
            .jobs
            .iter()
            .filter(|j| j.next_after(after) == Some(at))
            .collect();
        Some((at, due))
    }

    /// Dispatch jobs until `shutdown` is set
    ///
    /// Task failures are logged and never stop the loop.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        for job in &self.jobs {
            info!(task = %job.task, expression = %job.expression, "Scheduled job");
        }

        let mut after = Utc::now();
        loop {
            let Some((at, due)) = self.next_due(after) else {
                warn!("No upcoming scheduled jobs, stopping scheduler");
                break;
            };
            debug!(next_run = %at, jobs = due.len(), "Waiting for next scheduled run");

            if !wait_until(at, &shutdown).await {
                break;
            }

            for job in due {
                self.fire(job, at).await;
            }
            after = self.resume_after(at, Utc::now());
        }

        info!("Scheduler stopped");
    }

    /// Where to look for the next run once the run due at `at` is done
    ///
    /// Runs that fell due while the tasks ran or the host was suspended are
    /// skipped rather than replayed back to back.
    fn resume_after(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        if now <= at {
            return at;
        }
        let missed = self.runs_between(at, now);
        if missed > 0 {
            warn!(missed, from = %at, to = %now, "Skipping scheduled runs that are already past");
        }
        now
    }

    /// Number of job runs due in `(from, to]`
    fn runs_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
        self.jobs
            .iter()
            .map(|j| j.schedule.after(&from).take_while(|t| *t <= to).count())
            .sum()
    }

    async fn fire(&self, job: &ScheduledJob, at: DateTime<Utc>) {
        if !job.gate.allows(at) {
            debug!(task = %job.task, gate = ?job.gate, "Scheduled run skipped by gate");
            return;
        }

        match self.orchestrator.execute(job.task).await {
            Ok(result) => {
                let failed = result.per_platform.values().filter(|r| !r.success).count();
                info!(
                    task = %job.task,
                    platforms = result.per_platform.len(),
                    failed,
                    "Scheduled task finished"
                );
            }
            Err(e) => error!(task = %job.task, error = %e, "Scheduled task failed"),
        }
    }
}

/// Sleep until `at`; returns false if shutdown was requested first
async fn wait_until(at: DateTime<Utc>, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping scheduler");
            return false;
        }
        let remaining = match (at - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => return true,
        };
        sleep(remaining.min(SHUTDOWN_POLL)).await;
    }
}
