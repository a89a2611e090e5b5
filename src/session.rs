//! Session store: the set of open diagram buffers and their on-disk identity.
//!
//! Two tabs may show the same backing file; such path-linked buffers are kept
//! content- and dirty-consistent by an explicit fan-out step inside every
//! mutating operation. Presentation layers poll [`SessionStore::revision`] to
//! find out when to re-render.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DIAGRAM;
use crate::render::ChartTheme;

/// Opaque buffer identifier, allocated from a persisted counter and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(u64);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// One open document: diagram source plus dirty/path state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    pub id: BufferId,
    /// User-facing tab name.
    pub name: String,
    /// Diagram source text.
    pub content: String,
    /// Backing file, absent until the buffer has been saved once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Content differs from the last loaded/persisted value.
    pub dirty: bool,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    buffers: Vec<Buffer>,
    active_id: Option<BufferId>,
    next_buffer_id: u64,
    chart_theme: ChartTheme,
    revision: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self {
            buffers: Vec::new(),
            active_id: None,
            next_buffer_id: 1,
            chart_theme: ChartTheme::Dark,
            revision: 0,
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted parts. Ephemeral state (revision,
    /// in-flight flags) always starts fresh.
    pub(crate) fn from_parts(
        buffers: Vec<Buffer>,
        active_id: Option<BufferId>,
        next_buffer_id: u64,
        chart_theme: ChartTheme,
    ) -> Self {
        Self { buffers, active_id, next_buffer_id, chart_theme, revision: 0 }
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn active_id(&self) -> Option<BufferId> {
        self.active_id
    }

    pub fn active_buffer(&self) -> Option<&Buffer> {
        self.active_id.and_then(|id| self.buffers.iter().find(|b| b.id == id))
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.id == id)
    }

    pub fn chart_theme(&self) -> ChartTheme {
        self.chart_theme
    }

    pub fn set_chart_theme(&mut self, theme: ChartTheme) {
        if self.chart_theme != theme {
            self.chart_theme = theme;
            self.revision += 1;
        }
    }

    /// Bumped on every observable mutation; poll it to know when to re-render.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn next_buffer_id(&self) -> u64 {
        self.next_buffer_id
    }

    fn allocate_id(&mut self) -> BufferId {
        let id = BufferId(self.next_buffer_id);
        self.next_buffer_id += 1;
        id
    }

    /// Create an untitled buffer seeded with the default diagram and make it
    /// active. New buffers start dirty: they have never been saved.
    pub fn create_buffer(&mut self) -> BufferId {
        let id = self.allocate_id();
        let buffer = Buffer {
            id,
            name: format!("Untitled-{}.mmd", self.buffers.len() + 1),
            content: DEFAULT_DIAGRAM.to_string(),
            path: None,
            dirty: true,
        };
        self.buffers.push(buffer);
        self.active_id = Some(id);
        self.revision += 1;
        id
    }

    /// Remove a buffer. If it was active, activation falls back to the last
    /// remaining buffer, or to none. Unknown ids are a no-op.
    pub fn close_buffer(&mut self, id: BufferId) {
        let before = self.buffers.len();
        self.buffers.retain(|b| b.id != id);
        if self.buffers.len() == before {
            return;
        }
        if self.active_id == Some(id) {
            self.active_id = self.buffers.last().map(|b| b.id);
        }
        self.revision += 1;
    }

    /// Set the active selection. Existence is deliberately not validated
    /// here; callers at the boundary check ids, and a stale selection is
    /// benign at render time.
    pub fn select_buffer(&mut self, id: BufferId) {
        if self.active_id != Some(id) {
            self.active_id = Some(id);
            self.revision += 1;
        }
    }

    /// Replace the active buffer's content, marking it dirty, and fan the
    /// same content out to every buffer sharing its backing path. Writing
    /// the unchanged text is a no-op so redundant edits never mark dirty or
    /// trigger re-renders.
    pub fn update_active_content(&mut self, text: &str) {
        let Some(active_id) = self.active_id else { return };
        let Some(active) = self.buffers.iter().find(|b| b.id == active_id) else { return };
        if active.content == text {
            return;
        }
        let linked_path = active.path.clone();

        for buffer in &mut self.buffers {
            let is_active = buffer.id == active_id;
            let is_linked = match (&linked_path, &buffer.path) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if is_active || is_linked {
                buffer.content = text.to_string();
                buffer.dirty = true;
            }
        }
        self.revision += 1;
    }

    /// Attach on-disk identity after a successful save-as.
    pub fn bind_path(&mut self, id: BufferId, path: &Path, name: &str) {
        if let Some(buffer) = self.buffers.iter_mut().find(|b| b.id == id) {
            buffer.path = Some(path.to_path_buf());
            buffer.name = name.to_string();
            buffer.dirty = false;
            self.revision += 1;
        }
    }

    /// Mark a buffer clean after a save or reload, and bring every
    /// path-linked duplicate tab in line with its content.
    pub fn mark_persisted(&mut self, id: BufferId) {
        let Some(target) = self.buffers.iter().find(|b| b.id == id) else { return };
        let target_path = target.path.clone();
        let target_content = target.content.clone();

        for buffer in &mut self.buffers {
            if buffer.id == id {
                buffer.dirty = false;
                continue;
            }
            let linked = match (&target_path, &buffer.path) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if linked {
                buffer.content = target_content.clone();
                buffer.dirty = false;
            }
        }
        self.revision += 1;
    }

    /// Open a document in a tab, or focus the tab that already shows the
    /// same backing file. Returns the id of the buffer that ended up active.
    pub fn open_or_focus(&mut self, name: &str, content: &str, path: Option<PathBuf>) -> BufferId {
        if let Some(ref incoming) = path
            && let Some(existing) = self.buffers.iter().find(|b| b.path.as_ref() == Some(incoming))
        {
            let id = existing.id;
            self.select_buffer(id);
            return id;
        }

        let id = self.allocate_id();
        let dirty = path.is_none();
        self.buffers.push(Buffer { id, name: name.to_string(), content: content.to_string(), path, dirty });
        self.active_id = Some(id);
        self.revision += 1;
        id
    }
}
