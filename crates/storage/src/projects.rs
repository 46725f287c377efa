// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project registry.
//!
//! The registry maps user-assigned short names to absolute project
//! roots. Entries are created by `register`, deleted by `unregister`,
//! and otherwise mutated only to stamp the last-session timestamp.

use crate::locked::{load_json, save_json_atomic, FileLock};
use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A registered project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub path: PathBuf,
    pub name: Option<String>,
    pub registered: DateTime<Utc>,
    pub last_session: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectsDocument {
    projects: Vec<Project>,
}

/// Registry over `projects.json`, rewritten whole on every mutation.
pub struct ProjectRegistry {
    path: PathBuf,
}

impl ProjectRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Register a project root with an optional unique short name.
    pub fn register(
        &self,
        project_path: &Path,
        name: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Project, StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        let mut doc: ProjectsDocument = load_json(&self.path)?.unwrap_or_default();

        if doc.projects.iter().any(|p| p.path == project_path) {
            return Err(StorageError::Conflict(format!(
                "project already registered: {}",
                project_path.display()
            )));
        }
        if let Some(name) = &name {
            if doc.projects.iter().any(|p| p.name.as_deref() == Some(name)) {
                return Err(StorageError::Conflict(format!(
                    "project name already in use: {name}"
                )));
            }
        }

        let project = Project {
            path: project_path.to_path_buf(),
            name,
            registered: now,
            last_session: None,
        };
        doc.projects.push(project.clone());
        save_json_atomic(&self.path, &doc)?;
        Ok(project)
    }

    /// Remove a project by path or short name; returns whether one was removed.
    pub fn unregister(&self, path_or_name: &str) -> Result<bool, StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        let mut doc: ProjectsDocument = load_json(&self.path)?.unwrap_or_default();
        let before = doc.projects.len();
        doc.projects
            .retain(|p| p.name.as_deref() != Some(path_or_name) && p.path != Path::new(path_or_name));
        let removed = doc.projects.len() < before;
        if removed {
            save_json_atomic(&self.path, &doc)?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> Result<Vec<Project>, StorageError> {
        let doc: ProjectsDocument = load_json(&self.path)?.unwrap_or_default();
        Ok(doc.projects)
    }

    /// Resolve a short name (or path) to the registered project root.
    ///
    /// Unknown names resolve to `None`; the caller decides whether to
    /// pass the raw value through.
    pub fn resolve(&self, name_or_path: &str) -> Result<Option<PathBuf>, StorageError> {
        let doc: ProjectsDocument = load_json(&self.path)?.unwrap_or_default();
        Ok(doc
            .projects
            .iter()
            .find(|p| p.name.as_deref() == Some(name_or_path) || p.path == Path::new(name_or_path))
            .map(|p| p.path.clone()))
    }

    /// Stamp the last-session timestamp for a project root.
    pub fn stamp_last_session(
        &self,
        project_path: &Path,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(&self.path)?;
        let mut doc: ProjectsDocument = load_json(&self.path)?.unwrap_or_default();
        if let Some(project) = doc.projects.iter_mut().find(|p| p.path == project_path) {
            project.last_session = Some(now);
            save_json_atomic(&self.path, &doc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "projects_tests.rs"]
mod tests;
