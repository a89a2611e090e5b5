//! Headless core of a desktop Mermaid diagram editor.
//!
//! Owns the multi-tab session model (buffers, dirty/path state, duplicate-tab
//! synchronization), the streaming AI rewrite pipeline (SSE chat completions
//! with mid-stream cancellation and fence stripping), and the file
//! persistence bridge. Rendering, the editor widget, and native dialogs are
//! host collaborators behind traits.

pub mod constants;
pub mod files;
pub mod llm;
pub mod persistence;
pub mod provider;
pub mod render;
pub mod rewrite;
pub mod session;

pub use files::{FileDialogs, SaveOutcome};
pub use llm::{CancelFlag, StreamEvent};
pub use persistence::SessionStorage;
pub use provider::ProviderConfig;
pub use render::{ChartTheme, DiagramRenderer};
pub use rewrite::{RewriteController, RewriteError, RewriteOutcome};
pub use session::{Buffer, BufferId, SessionStore};
