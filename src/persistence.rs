//! On-disk persistence for the session and provider configuration.
//!
//! Everything lives as YAML under one fixed namespace directory. Ephemeral
//! state (rewrite in-progress, revision counter) is never written, so a
//! restored session always comes back idle. Missing or unreadable files fall
//! back to defaults instead of failing startup.

use std::fs;
use std::io;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{PROVIDER_FILE, SESSION_FILE, STORE_DIR};
use crate::provider::ProviderConfig;
use crate::render::ChartTheme;
use crate::session::{Buffer, BufferId, SessionStore};

/// Persisted shape of the session store.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    buffers: Vec<Buffer>,
    active_id: Option<BufferId>,
    next_buffer_id: u64,
    #[serde(default)]
    chart_theme: ChartTheme,
}

/// Persisted provider configuration. The key is written in clear to the
/// user's own config directory, like the browser-storage original; masking
/// is a UI concern.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedProvider {
    base_url: String,
    #[serde(default)]
    api_key: String,
    model: String,
}

/// Storage rooted at the namespace directory. Tests point it at a tempdir.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    root: PathBuf,
}

impl Default for SessionStorage {
    fn default() -> Self {
        Self { root: PathBuf::from(STORE_DIR) }
    }
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_path(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    fn provider_path(&self) -> PathBuf {
        self.root.join(PROVIDER_FILE)
    }

    /// Restore the session, or start empty when nothing (usable) is stored.
    pub fn load_session(&self) -> SessionStore {
        let path = self.session_path();
        let Ok(yaml) = fs::read_to_string(&path) else {
            return SessionStore::new();
        };
        match serde_yaml::from_str::<PersistedSession>(&yaml) {
            Ok(persisted) => SessionStore::from_parts(
                persisted.buffers,
                persisted.active_id,
                persisted.next_buffer_id,
                persisted.chart_theme,
            ),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable session file");
                SessionStore::new()
            }
        }
    }

    pub fn save_session(&self, store: &SessionStore) -> io::Result<()> {
        let persisted = PersistedSession {
            buffers: store.buffers().to_vec(),
            active_id: store.active_id(),
            next_buffer_id: store.next_buffer_id(),
            chart_theme: store.chart_theme(),
        };
        let yaml = serde_yaml::to_string(&persisted).map_err(io::Error::other)?;
        fs::create_dir_all(&self.root)?;
        fs::write(self.session_path(), yaml)
    }

    /// Restore provider configuration. A stored file wins; an empty stored
    /// key still defers to the environment so `.env` setups keep working.
    pub fn load_provider(&self) -> ProviderConfig {
        let path = self.provider_path();
        let Ok(yaml) = fs::read_to_string(&path) else {
            return ProviderConfig::from_env();
        };
        match serde_yaml::from_str::<PersistedProvider>(&yaml) {
            Ok(persisted) => {
                let key = if persisted.api_key.is_empty() {
                    ProviderConfig::from_env().api_key().clone()
                } else {
                    SecretString::from(persisted.api_key)
                };
                ProviderConfig::new(&persisted.base_url, key, &persisted.model)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable provider file");
                ProviderConfig::from_env()
            }
        }
    }

    pub fn save_provider(&self, config: &ProviderConfig) -> io::Result<()> {
        let persisted = PersistedProvider {
            base_url: config.base_url().to_string(),
            api_key: config.api_key().expose_secret().to_string(),
            model: config.model().to_string(),
        };
        let yaml = serde_yaml::to_string(&persisted).map_err(io::Error::other)?;
        fs::create_dir_all(&self.root)?;
        fs::write(self.provider_path(), yaml)
    }
}
