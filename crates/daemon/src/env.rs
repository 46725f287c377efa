// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment handling for daemon paths.

use std::path::PathBuf;

/// State directory for the daemon.
///
/// `TEND_STATE_DIR` overrides everything (tests rely on this), then
/// `$XDG_STATE_HOME/tend`, then `~/.local/state/tend`.
pub fn state_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("TEND_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("tend"));
        }
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state/tend"))
}
