//! In-process timer trigger.
//!
//! Fires one tick per schedule occurrence. Ticks never overlap: fire times
//! missed while a tick was running collapse into a single past-due tick.

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;
use crate::schedule::{ScheduleExpression, TickInfo};
use chrono::{DateTime, Duration, Utc};
use std::future::Future;

/// A tick starting this long after its fire time is reported as past due.
const PAST_DUE_TOLERANCE_SECS: i64 = 1;

/// Fires ticks at the cadence of a schedule expression.
pub struct Trigger {
    schedule: ScheduleExpression,
}

impl Trigger {
    pub fn new(schedule: ScheduleExpression) -> Self {
        Self { schedule }
    }

    /// Run until Ctrl-C.
    pub async fn run(&self, reconciler: &Reconciler) -> Result<()> {
        self.run_until(reconciler, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes. A tick in progress is allowed to finish.
    pub async fn run_until<F>(&self, reconciler: &Reconciler, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(schedule = %self.schedule, "Timer trigger started");

        let mut anchor = Utc::now();
        let mut last = None;

        loop {
            let scheduled = self.schedule.next_after(anchor).ok_or_else(|| Error::Schedule {
                expression: self.schedule.to_string(),
                message: "no upcoming fire time".to_string(),
            })?;

            let now = Utc::now();
            if scheduled > now {
                let wait = (scheduled - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Timer trigger stopped");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            let fired_at = Utc::now();
            let firing = Firing::new(scheduled, fired_at);
            let tick = TickInfo {
                fired_at,
                last,
                next: self.schedule.next_after(fired_at),
                is_past_due: firing.past_due,
            };

            reconciler.run_once(&tick).await;

            last = Some(fired_at);
            anchor = firing.next_anchor;
        }
    }
}

/// How one fire time played out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Firing {
    past_due: bool,
    /// Instant the following fire time is computed after. A past-due tick
    /// anchors on its own start so the fire times it missed are skipped.
    next_anchor: DateTime<Utc>,
}

impl Firing {
    fn new(scheduled: DateTime<Utc>, fired_at: DateTime<Utc>) -> Self {
        let past_due = is_past_due(scheduled, fired_at);
        Self {
            past_due,
            next_anchor: if past_due { fired_at } else { scheduled },
        }
    }
}

fn is_past_due(scheduled: DateTime<Utc>, fired_at: DateTime<Utc>) -> bool {
    fired_at - scheduled > Duration::seconds(PAST_DUE_TOLERANCE_SECS)
}
