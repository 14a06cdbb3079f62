//! Schedule table and the `ran daemon` driver.
//!
//! The daemon wakes once per UTC minute, runs the jobs due at that minute one
//! after another, then drains the change-event outbox so triggers fire for
//! whatever the jobs wrote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::Serialize;

use crate::Result;
use crate::generator::ContentGenerator;
use crate::jobs::{self, Job, JobContext, JobReport};
use crate::storage::Storage;

/// Upper bound on outbox events handled per tick.
pub const EVENTS_PER_TICK: usize = 500;

/// Missed minutes replayed after a stall; older ones are dropped.
pub const MAX_CATCH_UP_MINUTES: i64 = 60;

/// When a job fires, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every `n` minutes, aligned to the top of the hour
    EveryMinutes(u32),
    /// At minute 0 of every hour
    Hourly,
    /// Once a day
    DailyAt { hour: u32, minute: u32 },
    /// Once a week
    WeeklyAt { weekday: Weekday, hour: u32, minute: u32 },
}

impl Schedule {
    /// Whether the schedule fires at the minute containing `t`.
    pub fn is_due(&self, t: DateTime<Utc>) -> bool {
        match *self {
            Schedule::EveryMinutes(n) => n > 0 && t.minute() % n == 0,
            Schedule::Hourly => t.minute() == 0,
            Schedule::DailyAt { hour, minute } => t.hour() == hour && t.minute() == minute,
            Schedule::WeeklyAt {
                weekday,
                hour,
                minute,
            } => t.weekday() == weekday && t.hour() == hour && t.minute() == minute,
        }
    }
}

/// The daemon's schedule table.
pub const SCHEDULE: &[(Job, Schedule)] = &[
    (Job::Activity, Schedule::DailyAt { hour: 0, minute: 0 }),
    (Job::Activity, Schedule::DailyAt { hour: 6, minute: 0 }),
    (Job::Activity, Schedule::DailyAt { hour: 12, minute: 0 }),
    (Job::NetworkStatus, Schedule::DailyAt { hour: 1, minute: 0 }),
    (Job::CeoDirective, Schedule::DailyAt { hour: 2, minute: 0 }),
    (Job::Financial, Schedule::DailyAt { hour: 3, minute: 0 }),
    (Job::Lifecycle, Schedule::DailyAt { hour: 4, minute: 0 }),
    (Job::WatcherReport, Schedule::DailyAt { hour: 6, minute: 30 }),
    (
        Job::OracleUpdate,
        Schedule::WeeklyAt {
            weekday: Weekday::Mon,
            hour: 8,
            minute: 0,
        },
    ),
    (Job::VoteTally, Schedule::Hourly),
    (Job::Observers, Schedule::EveryMinutes(15)),
    (Job::Reactions, Schedule::EveryMinutes(15)),
];

/// Jobs due at the minute containing `t`, in table order.
pub fn due_jobs(t: DateTime<Utc>) -> Vec<Job> {
    let mut due = Vec::new();
    for (job, schedule) in SCHEDULE {
        if schedule.is_due(t) && !due.contains(job) {
            due.push(*job);
        }
    }
    due
}

/// Truncate to the start of the minute.
pub fn floor_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(i64::from(t.second())) - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Everything one tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    #[serde(with = "crate::models::timestamp")]
    pub minute: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
    pub triggers: Vec<JobReport>,
}

/// Run the jobs due at `minute`, then dispatch the resulting change events.
pub fn tick(
    storage: &Storage,
    generator: &dyn ContentGenerator,
    minute: DateTime<Utc>,
    seed: Option<u64>,
) -> Result<TickReport> {
    let seed = seed.map(|s| s.wrapping_add(minute.timestamp() as u64));
    let mut ctx = JobContext::new(storage, generator, minute, seed);

    let jobs = due_jobs(minute)
        .into_iter()
        .map(|job| jobs::run_job(&mut ctx, job))
        .collect();

    let triggers = jobs::dispatch_changes(&mut ctx, EVENTS_PER_TICK)?;

    Ok(TickReport {
        minute,
        jobs,
        triggers,
    })
}

/// Run the schedule until `stop` is set.
///
/// Minutes missed while a tick was running are replayed in order, up to
/// [`MAX_CATCH_UP_MINUTES`].
pub fn run_daemon(
    storage: &Storage,
    generator: &dyn ContentGenerator,
    stop: &AtomicBool,
    seed: Option<u64>,
) -> Result<()> {
    tracing::info!(jobs = SCHEDULE.len(), "daemon started");
    let mut last: Option<DateTime<Utc>> = None;

    while !stop.load(Ordering::SeqCst) {
        let current = floor_minute(Utc::now());
        let first = match last {
            Some(prev) if prev >= current => None,
            Some(prev) => {
                let earliest = current - Duration::minutes(MAX_CATCH_UP_MINUTES - 1);
                let next = prev + Duration::minutes(1);
                if next < earliest {
                    tracing::warn!(
                        skipped = (earliest - next).num_minutes(),
                        "daemon fell behind, dropping missed minutes"
                    );
                }
                Some(next.max(earliest))
            }
            None => Some(current),
        };

        if let Some(mut minute) = first {
            while minute <= current && !stop.load(Ordering::SeqCst) {
                match tick(storage, generator, minute, seed) {
                    Ok(report) => {
                        if !report.jobs.is_empty() || !report.triggers.is_empty() {
                            tracing::info!(
                                minute = %report.minute,
                                jobs = report.jobs.len(),
                                triggers = report.triggers.len(),
                                "tick complete"
                            );
                        }
                    }
                    Err(e) => tracing::error!(minute = %minute, "tick failed: {}", e),
                }
                last = Some(minute);
                minute += Duration::minutes(1);
            }
        }

        std::thread::sleep(StdDuration::from_secs(1));
    }

    tracing::info!("daemon stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::CannedGenerator;
    use crate::models::{Financials, NetworkStatus};
    use crate::seed;
    use crate::storage::{Collection, CURRENT, MAIN};
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        // 2026-03-02 is a Monday
        Utc.with_ymd_and_hms(2026, 3, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_schedule_is_due() {
        assert!(Schedule::EveryMinutes(15).is_due(at(3, 5, 45)));
        assert!(!Schedule::EveryMinutes(15).is_due(at(3, 5, 46)));
        assert!(Schedule::Hourly.is_due(at(3, 17, 0)));
        assert!(!Schedule::Hourly.is_due(at(3, 17, 1)));
        assert!(Schedule::DailyAt { hour: 6, minute: 30 }.is_due(at(4, 6, 30)));
        let weekly = Schedule::WeeklyAt {
            weekday: Weekday::Mon,
            hour: 8,
            minute: 0,
        };
        assert!(weekly.is_due(at(2, 8, 0)));
        assert!(!weekly.is_due(at(3, 8, 0)));
    }

    #[test]
    fn test_due_jobs_table() {
        assert_eq!(
            due_jobs(at(3, 0, 0)),
            vec![Job::Activity, Job::VoteTally, Job::Observers, Job::Reactions]
        );
        assert_eq!(
            due_jobs(at(3, 3, 0)),
            vec![Job::Financial, Job::VoteTally, Job::Observers, Job::Reactions]
        );
        assert_eq!(due_jobs(at(3, 6, 30)), vec![Job::WatcherReport, Job::Observers, Job::Reactions]);
        assert!(due_jobs(at(2, 8, 0)).contains(&Job::OracleUpdate));
        assert!(!due_jobs(at(3, 8, 0)).contains(&Job::OracleUpdate));
        assert!(due_jobs(at(3, 9, 7)).is_empty());
    }

    #[test]
    fn test_floor_minute() {
        let t = Utc.with_ymd_and_hms(2026, 3, 3, 4, 5, 59).unwrap() + Duration::milliseconds(250);
        assert_eq!(floor_minute(t), at(3, 4, 5));
    }

    #[test]
    fn test_tick_runs_due_jobs_and_triggers() {
        let storage = Storage::open_in_memory().unwrap();
        seed::bootstrap(&storage, at(3, 0, 0)).unwrap();
        let generator = CannedGenerator::new();

        let report = tick(&storage, &generator, at(3, 1, 0), Some(3)).unwrap();
        let names: Vec<_> = report.jobs.iter().map(|r| r.job.as_str()).collect();
        assert_eq!(names, vec!["network-status", "vote-tally", "observers", "reactions"]);
        assert!(storage
            .get::<NetworkStatus>(Collection::NetworkStatus, CURRENT)
            .unwrap()
            .is_some());
        assert!(report
            .triggers
            .iter()
            .any(|r| r.job == "on-network-status-written"));
        assert_eq!(storage.pending_event_count().unwrap(), 0);

        let before: Financials = storage.get_required(Collection::Financials, MAIN).unwrap();
        tick(&storage, &generator, at(3, 3, 0), Some(3)).unwrap();
        let after: Financials = storage.get_required(Collection::Financials, MAIN).unwrap();
        assert!(after.balance < before.balance);
    }

    #[test]
    fn test_daemon_returns_when_stopped() {
        let storage = Storage::open_in_memory().unwrap();
        let generator = CannedGenerator::new();
        let stop = AtomicBool::new(true);
        run_daemon(&storage, &generator, &stop, None).unwrap();
    }
}
