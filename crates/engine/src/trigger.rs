// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron triggers.
//!
//! Each trigger evaluates its own schedule against a persisted
//! last-fired timestamp. The one-minute catch-up floor makes a freshly
//! constructed trigger fire once at startup when its schedule passed
//! within the last minute, then resume normal cadence.

use crate::EngineError;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;
use tend_core::{Clock, TriggerConfig};
use tend_storage::TriggerStateStore;

/// How far back a new trigger looks for a missed occurrence, in seconds.
const CATCH_UP_WINDOW_SECS: i64 = 60;

/// A schedule evaluator with persisted fired-at state.
pub struct CronTrigger<C: Clock> {
    config: TriggerConfig,
    schedule: Schedule,
    store: TriggerStateStore,
    last_fired_at: Option<DateTime<Utc>>,
    clock: C,
}

impl<C: Clock> CronTrigger<C> {
    /// Parse the configured schedule and bind the trigger to its state
    /// store. Fails loudly on an invalid expression.
    pub fn new(
        config: TriggerConfig,
        store: TriggerStateStore,
        clock: C,
    ) -> Result<Self, EngineError> {
        let schedule =
            parse_schedule(&config.schedule).map_err(|source| EngineError::InvalidSchedule {
                name: config.name.clone(),
                schedule: config.schedule.clone(),
                source,
            })?;
        Ok(Self {
            config,
            schedule,
            store,
            last_fired_at: None,
            clock,
        })
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn last_fired_at(&self) -> Option<DateTime<Utc>> {
        self.last_fired_at
    }

    /// Load the persisted last-fired timestamp.
    pub fn load_state(&mut self) -> Result<(), tend_storage::StorageError> {
        self.last_fired_at = self.store.load(&self.config.name)?;
        Ok(())
    }

    /// Whether the next scheduled moment after
    /// `max(last_fired_at, now - 1min)` has arrived.
    pub fn is_due(&self) -> bool {
        let now = self.clock.now();
        let floor = now - Duration::seconds(CATCH_UP_WINDOW_SECS);
        let base = match self.last_fired_at {
            Some(fired) => fired.max(floor),
            None => floor,
        };
        self.schedule
            .after(&base)
            .next()
            .is_some_and(|next| next <= now)
    }

    /// Stamp `last_fired_at = now` and persist it.
    ///
    /// Persistence failure is logged but non-fatal: the in-memory stamp
    /// still prevents a refire this run, and the worst restart cost is
    /// one duplicate firing.
    pub fn mark_fired(&mut self) {
        let now = self.clock.now();
        self.last_fired_at = Some(now);
        if let Err(e) = self.store.save(&self.config.name, now) {
            tracing::warn!(
                trigger = %self.config.name,
                error = %e,
                "failed to persist trigger fired-at state"
            );
        }
    }
}

/// Parse a cron expression, accepting the common five-field form.
///
/// The cron crate wants a seconds field; five-field expressions get
/// `0 ` prepended so "*/5 * * * *" means every five minutes on the
/// minute.
fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expr}"))
    } else {
        Schedule::from_str(expr)
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
