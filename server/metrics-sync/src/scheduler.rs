//! Daily sweep trigger.
//!
//! Sweeps never overlap: a trigger that arrives while one is running is refused.

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::error::ScheduleError;
use crate::orchestrator::{Orchestrator, SweepReport};

pub struct Scheduler {
  orchestrator: Arc<Orchestrator>,
  config: ScheduleConfig,
  sweep_lock: Mutex<()>,
}

impl Scheduler {
  pub fn new(orchestrator: Arc<Orchestrator>, config: ScheduleConfig) -> Self {
    Self {
      orchestrator,
      config,
      sweep_lock: Mutex::new(()),
    }
  }

  /// Run one sweep now, unless another is still in progress.
  pub async fn trigger_now(&self) -> Result<SweepReport, ScheduleError> {
    let _guard = self.sweep_lock.try_lock().map_err(|_| ScheduleError::SweepInProgress)?;
    Ok(self.orchestrator.sync_all_metrics().await?)
  }

  /// Fire a sweep every day at the configured local time. Never returns.
  pub async fn run(&self) {
    info!(at = %self.config.sync_at.format("%H:%M"), "scheduler started");
    loop {
      let now = Local::now();
      let next = next_run_after(&now, self.config.sync_at);
      let wait = (next - now).to_std().unwrap_or_default();
      info!(next = %next.to_rfc3339(), "next sweep scheduled");
      tokio::time::sleep(wait).await;

      match self.trigger_now().await {
        Ok(report) => info!(synced = report.synced.len(), failed = report.failed.len(), "scheduled sweep done"),
        Err(ScheduleError::SweepInProgress) => warn!("previous sweep still running, skipping"),
        Err(err) => error!(error = %err, "scheduled sweep failed"),
      }
    }
  }
}

/// First instant strictly after `now` whose local time of day is `at`.
///
/// When `at` falls in a DST gap the run moves forward one hour; when it is ambiguous the
/// earlier instant wins.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
  let tz = now.timezone();
  let mut day = now.date_naive();
  loop {
    let local = day.and_time(at);
    let candidate = tz
      .from_local_datetime(&local)
      .earliest()
      .or_else(|| tz.from_local_datetime(&(local + chrono::Duration::hours(1))).earliest());
    if let Some(candidate) = candidate {
      if candidate > *now {
        return candidate;
      }
    }
    day = match day.checked_add_days(Days::new(1)) {
      Some(next) => next,
      None => return now.clone(),
    };
  }
}
