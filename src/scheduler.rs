// src/scheduler.rs
//! Daily wall-clock trigger (UTC) plus a manual run-now entry point.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;

use crate::orchestrator::RunReport;

/// Time of day, "HH:MM", 00:00..=23:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    hour: u32,
    minute: u32,
}

impl DailyTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            bail!("time of day out of range: {hour:02}:{minute:02}");
        }
        Ok(Self { hour, minute })
    }

    fn as_naive(self) -> NaiveTime {
        // Range checked in `new`.
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Next UTC instant at this time of day strictly after `now`.
    pub fn next_after(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.as_naive()).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl FromStr for DailyTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow!("expected HH:MM, got {s:?}"))?;
        let two_digits = |p: &str| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            bail!("expected HH:MM, got {s:?}");
        }
        let hour: u32 = h.parse().map_err(|_| anyhow!("bad hour in {s:?}"))?;
        let minute: u32 = m.parse().map_err(|_| anyhow!("bad minute in {s:?}"))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, now: DateTime<Utc>) -> RunReport;
}

pub struct DailyScheduler {
    at: DailyTime,
    job: Arc<dyn Job>,
}

impl DailyScheduler {
    pub fn new(at: DailyTime, job: Arc<dyn Job>) -> Self {
        Self { at, job }
    }

    /// Manual trigger.
    pub async fn run_now(&self) -> RunReport {
        tracing::info!(target: "scheduler", "manual run");
        self.job.run(Utc::now()).await
    }

    /// Background loop: optional immediate run, then once per day at `at`.
    pub fn spawn(self, run_on_start: bool) -> JoinHandle<()> {
        tokio::spawn(async move {
            if run_on_start {
                tracing::info!(target: "scheduler", "run on start");
                self.job.run(Utc::now()).await;
            }
            loop {
                let now = Utc::now();
                let next = self.at.next_after(now);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::info!(target: "scheduler", next = %next, wait_secs = wait.as_secs(), "sleeping until next run");
                tokio::time::sleep(wait).await;
                let report = self.job.run(Utc::now()).await;
                tracing::info!(target: "scheduler", ok = report.all_ok(), "daily run finished");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_valid_and_rejects_invalid() {
        assert_eq!("09:00".parse::<DailyTime>().unwrap(), DailyTime::new(9, 0).unwrap());
        assert_eq!("23:59".parse::<DailyTime>().unwrap().to_string(), "23:59");
        for bad in ["24:00", "9:00", "09:60", "0900", "", "ab:cd", "09:00:00", "+9:00", "09:+5", "-1:00"] {
            assert!(bad.parse::<DailyTime>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn next_after_same_day_and_next_day() {
        let t: DailyTime = "09:00".parse().unwrap();
        let before = Utc.with_ymd_and_hms(2025, 1, 1, 8, 59, 59).unwrap();
        assert_eq!(t.next_after(before), Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap());
        let exactly = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(t.next_after(exactly), Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn next_after_crosses_midnight_and_year() {
        let t: DailyTime = "00:00".parse().unwrap();
        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(t.next_after(late), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }
}
