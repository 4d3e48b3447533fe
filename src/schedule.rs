//! Trigger cadence and tick metadata.

use crate::config::{Config, DEFAULT_SCHEDULE};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// A parsed cron expression (seconds, minutes, hours, day of month, month, day of week).
#[derive(Debug, Clone)]
pub struct ScheduleExpression {
    expression: String,
    schedule: cron::Schedule,
}

impl ScheduleExpression {
    /// Parse a six-field expression. Five-field expressions fire at second 0.
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let fields = expression.split_whitespace().count();

        let normalized = if fields == 5 {
            format!("0 {}", expression)
        } else {
            expression.to_string()
        };

        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| Error::Schedule {
            expression: expression.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The expression as configured.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// The next `count` fire times after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&after).take(count).collect()
    }
}

impl FromStr for ScheduleExpression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Supplies the configured cadence, falling back to every 30 seconds.
#[derive(Debug, Clone, Default)]
pub struct ScheduleProvider {
    configured: Option<String>,
}

impl ScheduleProvider {
    pub fn new(configured: Option<String>) -> Self {
        Self { configured }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Some(config.schedule_expression.clone()))
    }

    /// The active schedule.
    pub fn current_schedule(&self) -> Result<ScheduleExpression> {
        let expression = self
            .configured
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SCHEDULE);

        ScheduleExpression::parse(expression)
    }
}

/// Metadata handed to each tick. Only used for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// When the tick actually started.
    pub fired_at: DateTime<Utc>,
    /// Previous fire time, if any.
    pub last: Option<DateTime<Utc>>,
    /// Next scheduled fire time.
    pub next: Option<DateTime<Utc>>,
    /// The tick started noticeably later than scheduled.
    pub is_past_due: bool,
}

impl TickInfo {
    /// Metadata for a one-off invocation outside of any schedule.
    pub fn manual(schedule: &ScheduleExpression) -> Self {
        let now = Utc::now();
        Self {
            fired_at: now,
            last: None,
            next: schedule.next_after(now),
            is_past_due: false,
        }
    }
}
