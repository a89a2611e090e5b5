//! Boundary to the rendering collaborator that turns diagram source into a
//! visual artifact. The implementation lives in the host shell; this crate
//! only fixes the contract and re-renders whenever content or theme changes
//! (tracked through [`crate::session::SessionStore::revision`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SessionStore;

/// Diagram theme, persisted with the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartTheme {
    Default,
    Neutral,
    #[default]
    Dark,
    Forest,
    Base,
}

/// Syntax error reported by the renderer, carrying its human-readable
/// message verbatim.
#[derive(Debug, Clone)]
pub struct RenderError {
    pub message: String,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Render error: {}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// Renders diagram source text into a host-defined artifact (typically SVG
/// markup).
pub trait DiagramRenderer {
    fn render(&self, source: &str, theme: ChartTheme) -> Result<String, RenderError>;
}

/// Render the active buffer, if any, with the session's current theme.
pub fn render_active<R: DiagramRenderer>(
    store: &SessionStore,
    renderer: &R,
) -> Option<Result<String, RenderError>> {
    let buffer = store.active_buffer()?;
    Some(renderer.render(&buffer.content, store.chart_theme()))
}
