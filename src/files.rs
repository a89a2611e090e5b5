//! Persistence bridge: maps session buffers to files on disk.
//!
//! Native path pickers are a host collaborator behind [`FileDialogs`]; the
//! bridge owns the policy — save-as resolution for unsaved buffers,
//! de-duplication by path on open, and the legacy metadata scrub.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::LEGACY_LAYOUT_MARKER;
use crate::session::{BufferId, SessionStore};

/// Native open/save dialogs, provided by the host shell. `None` means the
/// user dismissed the picker.
pub trait FileDialogs {
    fn pick_open(&self) -> Option<PathBuf>;
    fn pick_save(&self, suggested_name: &str) -> Option<PathBuf>;
}

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// Buffer already has a path and no unsaved changes; nothing written.
    AlreadyClean,
    /// User dismissed the save-as picker; state untouched.
    Cancelled,
    NoActiveBuffer,
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "Untitled.mmd".to_string())
}

/// Ask for a file and load it into a tab, focusing the existing tab when the
/// file is already open. Returns `None` when the picker was dismissed.
pub fn open_into_tab(store: &mut SessionStore, dialogs: &dyn FileDialogs) -> io::Result<Option<BufferId>> {
    let Some(path) = dialogs.pick_open() else {
        return Ok(None);
    };
    let mut content = fs::read_to_string(&path)?;

    // Older releases stored layout metadata inline after a marker comment.
    if let Some(idx) = content.find(LEGACY_LAYOUT_MARKER) {
        debug!(path = %path.display(), "scrubbing legacy layout metadata");
        content = content[..idx].trim().to_string();
    }

    let name = display_name(&path);
    Ok(Some(store.open_or_focus(&name, &content, Some(path))))
}

/// Save the active buffer, resolving a path through the save-as picker when
/// it has never been saved.
pub fn save_active(store: &mut SessionStore, dialogs: &dyn FileDialogs) -> io::Result<SaveOutcome> {
    let Some(active) = store.active_buffer() else {
        return Ok(SaveOutcome::NoActiveBuffer);
    };
    if active.path.is_some() && !active.dirty {
        return Ok(SaveOutcome::AlreadyClean);
    }

    let id = active.id;
    let content = active.content.clone();
    let (path, newly_bound) = match &active.path {
        Some(path) => (path.clone(), false),
        None => match dialogs.pick_save(&active.name) {
            Some(path) => (path, true),
            None => return Ok(SaveOutcome::Cancelled),
        },
    };

    fs::write(&path, &content)?;

    // Bind on-disk identity only after the write succeeded, then propagate
    // the clean state to any tab sharing the path.
    if newly_bound {
        store.bind_path(id, &path, &display_name(&path));
    }
    store.mark_persisted(id);
    Ok(SaveOutcome::Saved(path))
}
