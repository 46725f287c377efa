// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-trigger fired-at state.

use crate::locked::{load_json, save_json_atomic};
use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tend_core::sanitize_trigger_name;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerStateDocument {
    last_fired_at: Option<DateTime<Utc>>,
}

/// Stores each trigger's last-fired timestamp as `cron-<name>.json`.
pub struct TriggerStateStore {
    dir: PathBuf,
}

impl TriggerStateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn load(&self, trigger_name: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let doc: Option<TriggerStateDocument> = load_json(&self.path_for(trigger_name))?;
        Ok(doc.and_then(|d| d.last_fired_at))
    }

    pub fn save(
        &self,
        trigger_name: &str,
        last_fired_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        save_json_atomic(
            &self.path_for(trigger_name),
            &TriggerStateDocument {
                last_fired_at: Some(last_fired_at),
            },
        )
    }

    fn path_for(&self, trigger_name: &str) -> PathBuf {
        self.dir
            .join(format!("cron-{}.json", sanitize_trigger_name(trigger_name)))
    }
}

#[cfg(test)]
#[path = "trigger_state_tests.rs"]
mod tests;
