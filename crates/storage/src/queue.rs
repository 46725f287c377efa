// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe FIFO work queue.

use crate::locked::{load_json, save_json_atomic, FileLock};
use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tend_core::QueueItem;

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueDocument {
    items: Vec<QueueItem>,
}

/// Persisted FIFO of deferred work over `queue.json`.
///
/// Mutations lock; `peek`/`size`/`is_empty` are lock-free and
/// best-effort consistent.
pub struct WorkQueue {
    path: PathBuf,
}

impl WorkQueue {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an item to the tail.
    pub fn enqueue(&self, item: QueueItem) -> Result<(), StorageError> {
        self.ensure_exists()?;
        let _lock = FileLock::acquire(&self.path)?;
        let mut doc: QueueDocument = load_json(&self.path)?.unwrap_or_default();
        doc.items.push(item);
        save_json_atomic(&self.path, &doc)
    }

    /// Atomically remove and return the head, `None` when empty.
    pub fn dequeue(&self) -> Result<Option<QueueItem>, StorageError> {
        self.ensure_exists()?;
        let _lock = FileLock::acquire(&self.path)?;
        let mut doc: QueueDocument = load_json(&self.path)?.unwrap_or_default();
        if doc.items.is_empty() {
            return Ok(None);
        }
        let head = doc.items.remove(0);
        save_json_atomic(&self.path, &doc)?;
        Ok(Some(head))
    }

    /// Head of the queue without removing it.
    pub fn peek(&self) -> Option<QueueItem> {
        self.read().items.into_iter().next()
    }

    pub fn size(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// All queued items, oldest first.
    pub fn items(&self) -> Vec<QueueItem> {
        self.read().items
    }

    fn read(&self) -> QueueDocument {
        load_json(&self.path).ok().flatten().unwrap_or_default()
    }

    /// Create the document with an empty items list before locking.
    fn ensure_exists(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            save_json_atomic(&self.path, &QueueDocument::default())?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
