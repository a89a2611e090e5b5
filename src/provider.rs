//! Connection parameters for the AI backend.
//!
//! The secret key is wrapped in [`SecretString`] so it never shows up in
//! `Debug` output or logs; it is exposed exactly once, when the
//! Authorization header is built.

use std::env;

use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Environment variables consulted when no key has been configured.
const KEY_ENV_VARS: &[&str] = &["MERMAID_STUDIO_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(String::new()),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Default configuration, picking the key up from the environment (and
    /// `.env`) when one is set there.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        for var in KEY_ENV_VARS {
            if let Ok(key) = env::var(var)
                && !key.is_empty()
            {
                config.api_key = SecretString::from(key);
                break;
            }
        }
        config
    }

    pub fn new(base_url: &str, api_key: SecretString, model: &str) -> Self {
        Self { base_url: base_url.to_string(), api_key, model: model.to_string() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }

    pub(crate) fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Explicit settings update; the only mutation path.
    pub fn update(&mut self, base_url: Option<&str>, api_key: Option<SecretString>, model: Option<&str>) {
        if let Some(url) = base_url {
            self.base_url = url.to_string();
        }
        if let Some(key) = api_key {
            self.api_key = key;
        }
        if let Some(model) = model {
            self.model = model.to_string();
        }
    }

    /// Completion endpoint for this provider.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
