//! Shared constants: prompts, templates, and the on-disk namespace.

/// System preset instructions sent with every rewrite request.
pub const SYSTEM_PROMPT: &str = "\
You are an expert in Mermaid.js.
Your task is to generate valid Mermaid diagrams based on user requests.
Rules:
1. Output ONLY the Mermaid code inside a markdown block like ```mermaid ... ```.
2. Do not include explanations unless requested.
3. If the user asks to modify an existing diagram, output the full updated code.
4. Use the \"graph TD\" or \"sequenceDiagram\" syntax by default unless specified otherwise.
5. Do not output any markdown formatting outside of the code block.
";

/// Seed content for a freshly created buffer.
pub const DEFAULT_DIAGRAM: &str = "graph TD
  A[Start] --> B{Is it working?}
  B -- Yes --> C[Great!]
  B -- No --> D[Debug]";

/// Directory holding persisted session and provider files.
pub const STORE_DIR: &str = "./.mermaid-studio";
pub const SESSION_FILE: &str = "session.yaml";
pub const PROVIDER_FILE: &str = "provider.yaml";

/// Extensions offered by the open/save dialogs.
pub const DIAGRAM_EXTENSIONS: &[&str] = &["mmd", "mermaid", "txt"];

/// Older releases appended layout metadata after this marker; files carrying
/// it are scrubbed on load.
pub const LEGACY_LAYOUT_MARKER: &str = "%% MERMAID_MASTER_LAYOUT=";

/// Build the user instruction for one rewrite request.
pub fn rewrite_instruction(requirement: &str) -> String {
    format!("Requirement: {}. \nOutput the FULL updated Mermaid code based on the current code.", requirement)
}

/// Build the system context message carrying the buffer being edited.
pub fn current_code_context(code: &str) -> String {
    format!("Current Diagram Code:\n```mermaid\n{}\n```", code)
}
