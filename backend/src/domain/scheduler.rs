//! Periodic trigger loop: enqueues scheduled commands, never executes them
//! inline.
//!
//! Grounded on spec.md §4.I / `SPEC_FULL.md` §4.I: since `apalis` is
//! declared in the dependency stack but, per `outbound/queue/mod.rs`'s
//! `StubRouteQueue`, never wired to a real backend, the scheduler instead
//! follows the teacher's own `tokio::time::interval`-based polling idiom.
//! Each trigger row is a [`TriggerSchedule`], computed once at startup and
//! re-evaluated on every tick to find the nearest due trigger.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use chrono_tz::Europe::Zurich;
use cron::Schedule;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// A unit of scheduled work, enqueued onto the worker's run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch every enabled API-backed source (spec.md trigger `fetch_providers`).
    FetchProviders,
    /// Fetch every enabled HTML-scraping source (trigger `fetch_scrapers`).
    FetchScrapers,
    /// Run the semantic-dedup sweep (trigger `dedup_semantic`).
    DedupSemantic,
    /// Run the URL health-check sweep (trigger `check_job_urls`).
    CheckJobUrls,
    /// Re-run saved searches (trigger `run_saved_searches`); the scheduler
    /// only enqueues this — execution is a downstream consumer's concern,
    /// out of scope here.
    RunSavedSearches,
}

/// How often a [`Command`] becomes due.
#[derive(Debug, Clone)]
pub enum TriggerSchedule {
    /// Fires every `interval`, first fire one `interval` after scheduler start.
    Interval(StdDuration),
    /// Fires on the next matching instant of a cron expression, evaluated
    /// in the Europe/Zurich timezone per spec.md's trigger table.
    Cron(Box<Schedule>),
}

impl TriggerSchedule {
    fn next_due(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(duration) => {
                let duration = chrono::Duration::from_std(*duration).ok()?;
                Some(after + duration)
            }
            Self::Cron(schedule) => {
                let zurich_after = after.with_timezone(&Zurich);
                schedule
                    .after(&zurich_after)
                    .next()
                    .map(|next| next.with_timezone(&Utc))
            }
        }
    }
}

struct Trigger {
    command: Command,
    schedule: TriggerSchedule,
    next_due: DateTime<Utc>,
}

/// Default interval for `fetch_providers`, in minutes.
pub const DEFAULT_FETCH_INTERVAL_MINUTES: u64 = 30;
/// Default interval for `fetch_scrapers`, in hours.
pub const DEFAULT_SCRAPER_INTERVAL_HOURS: u64 = 6;
/// Default interval for `run_saved_searches`, in minutes.
pub const DEFAULT_SEARCH_INTERVAL_MINUTES: u64 = 60;

/// Configuration for building a [`Scheduler`]'s trigger table.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Minutes between `fetch_providers` runs.
    pub fetch_interval_minutes: u64,
    /// Hours between `fetch_scrapers` runs.
    pub scraper_interval_hours: u64,
    /// Minutes between `run_saved_searches` runs.
    pub search_interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fetch_interval_minutes: DEFAULT_FETCH_INTERVAL_MINUTES,
            scraper_interval_hours: DEFAULT_SCRAPER_INTERVAL_HOURS,
            search_interval_minutes: DEFAULT_SEARCH_INTERVAL_MINUTES,
        }
    }
}

/// Polls a fixed trigger table and enqueues [`Command`]s as they come due.
pub struct Scheduler {
    triggers: Vec<Trigger>,
    sender: Sender<Command>,
    poll_interval: StdDuration,
}

/// A due cron expression failed to parse; the scheduler cannot start.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid cron expression {expression:?}: {message}")]
pub struct ScheduleError {
    /// The offending expression.
    pub expression: String,
    /// Parser failure detail.
    pub message: String,
}

impl Scheduler {
    /// Build the five-row trigger table from `config`, anchored at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] if a cron expression fails to parse — this
    /// should never happen for the fixed expressions below and indicates a
    /// programming error, not a runtime condition.
    pub fn new(
        config: SchedulerConfig,
        sender: Sender<Command>,
        poll_interval: StdDuration,
        now: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        let daily_04_00 = parse_cron("0 0 4 * * * *")?;
        let weekly_sunday_03_00 = parse_cron("0 0 3 * * Sun *")?;

        let rows = vec![
            Trigger {
                command: Command::FetchProviders,
                schedule: TriggerSchedule::Interval(StdDuration::from_secs(
                    config.fetch_interval_minutes * 60,
                )),
                next_due: now,
            },
            Trigger {
                command: Command::FetchScrapers,
                schedule: TriggerSchedule::Interval(StdDuration::from_secs(
                    config.scraper_interval_hours * 3600,
                )),
                next_due: now,
            },
            Trigger {
                command: Command::DedupSemantic,
                schedule: TriggerSchedule::Cron(Box::new(daily_04_00)),
                next_due: now,
            },
            Trigger {
                command: Command::CheckJobUrls,
                schedule: TriggerSchedule::Cron(Box::new(weekly_sunday_03_00)),
                next_due: now,
            },
            Trigger {
                command: Command::RunSavedSearches,
                schedule: TriggerSchedule::Interval(StdDuration::from_secs(
                    config.search_interval_minutes * 60,
                )),
                next_due: now,
            },
        ];

        let mut triggers = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.next_due = row.schedule.next_due(now).unwrap_or(now);
            triggers.push(row);
        }

        Ok(Self {
            triggers,
            sender,
            poll_interval,
        })
    }

    /// Run the poll loop until the sender's receiver is dropped.
    ///
    /// Never replays triggers missed while the process was down: each
    /// trigger's `next_due` is only ever advanced forward from "now" at
    /// startup, matching spec.md §4.I's "missed jobs are not replayed".
    pub async fn run(&mut self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let now = Utc::now();

            for trigger in &mut self.triggers {
                if trigger.next_due > now {
                    continue;
                }

                info!(command = ?trigger.command, "scheduler: enqueuing due trigger");
                if self.sender.send(trigger.command).await.is_err() {
                    warn!("scheduler: command channel closed, stopping");
                    return;
                }

                trigger.next_due = trigger.schedule.next_due(now).unwrap_or(now);
            }
        }
    }
}

fn parse_cron(expression: &str) -> Result<Schedule, ScheduleError> {
    expression
        .parse()
        .map_err(|error: cron::error::Error| ScheduleError {
            expression: expression.to_owned(),
            message: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tokio::sync::mpsc;

    use super::*;

    #[rstest]
    fn interval_schedule_advances_by_fixed_duration() {
        let schedule = TriggerSchedule::Interval(StdDuration::from_secs(1800));
        let now = Utc::now();
        let next = schedule.next_due(now).expect("interval always has a next");
        assert_eq!((next - now).num_seconds(), 1800);
    }

    #[rstest]
    fn daily_cron_fires_at_four_am_zurich() {
        let schedule = parse_cron("0 0 4 * * * *").expect("valid cron expression");
        let schedule = TriggerSchedule::Cron(Box::new(schedule));
        let anchor = DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
            .expect("fixed timestamp parses")
            .with_timezone(&Utc);
        let next = schedule.next_due(anchor).expect("cron always has a next");
        let zurich_next = next.with_timezone(&Zurich);
        assert_eq!(zurich_next.format("%H:%M").to_string(), "04:00");
    }

    #[rstest]
    #[tokio::test]
    async fn scheduler_builds_five_triggers_without_error() {
        let (sender, _receiver) = mpsc::channel(8);
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            sender,
            StdDuration::from_millis(10),
            Utc::now(),
        );
        assert!(scheduler.is_ok());
        assert_eq!(scheduler.expect("built above").triggers.len(), 5);
    }
}
