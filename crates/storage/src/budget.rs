// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling-window prompt budget tracker.
//!
//! The tracker is observational: it records consumption and answers
//! `can_run`, but nothing stops a caller that ignores the answer. The
//! reserve fraction keeps headroom for interactive use.

use crate::locked::{load_json, save_json_atomic, FileLock};
use crate::StorageError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tend_core::Clock;

/// Budget configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetConfig {
    pub max_prompts_per_window: u32,
    /// Fraction of the window held back for interactive sessions, in `[0, 1]`.
    pub reserve_for_interactive: f64,
    pub window_hours: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_prompts_per_window: 50,
            reserve_for_interactive: 0.25,
            window_hours: 5,
        }
    }
}

/// One prompt-consumption record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntry {
    pub timestamp: DateTime<Utc>,
    pub count: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BudgetDocument {
    entries: Vec<BudgetEntry>,
}

/// Rolling-window budget tracker over `budget.json`.
pub struct BudgetTracker<C: Clock> {
    config: BudgetConfig,
    state_file: PathBuf,
    clock: C,
}

impl<C: Clock> BudgetTracker<C> {
    pub fn new(config: BudgetConfig, state_file: PathBuf, clock: C) -> Self {
        Self {
            config,
            state_file,
            clock,
        }
    }

    /// Record `count` prompts consumed now.
    ///
    /// Acquires the advisory lock, rereads, prunes expired entries, and
    /// rewrites atomically, so concurrent writers never lose entries.
    pub fn record_usage(&self, count: u32) -> Result<(), StorageError> {
        let now = self.clock.now();
        let _lock = FileLock::acquire(&self.state_file)?;
        let mut doc: BudgetDocument = load_json(&self.state_file)?.unwrap_or_default();
        self.prune(&mut doc, now);
        doc.entries.push(BudgetEntry {
            timestamp: now,
            count,
        });
        save_json_atomic(&self.state_file, &doc)
    }

    /// Prompts consumed within the current window.
    pub fn used_in_window(&self) -> Result<u32, StorageError> {
        let now = self.clock.now();
        let mut doc: BudgetDocument = load_json(&self.state_file)?.unwrap_or_default();
        // Reads prune too, but do not write back.
        self.prune(&mut doc, now);
        Ok(doc.entries.iter().map(|e| e.count).sum())
    }

    /// Prompts left in the window, saturating at zero.
    pub fn remaining(&self) -> Result<u32, StorageError> {
        let used = self.used_in_window()?;
        Ok(self.config.max_prompts_per_window.saturating_sub(used))
    }

    /// Whether an autonomous run fits over the interactive reserve.
    ///
    /// Strict comparison: a remaining count equal to the reserve is not
    /// enough.
    pub fn can_run(&self) -> Result<bool, StorageError> {
        let remaining = self.remaining()?;
        let reserve =
            f64::from(self.config.max_prompts_per_window) * self.config.reserve_for_interactive;
        Ok(f64::from(remaining) > reserve)
    }

    fn prune(&self, doc: &mut BudgetDocument, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(i64::from(self.config.window_hours));
        doc.entries.retain(|e| e.timestamp > cutoff);
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
