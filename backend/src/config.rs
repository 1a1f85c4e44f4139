//! Process configuration.
//!
//! Read once at startup from the environment (a `.env` file is honoured).
//!
//! | Variable                | Required | Meaning                                   |
//! |-------------------------|----------|-------------------------------------------|
//! | `CLIMATIQ_API_KEY`      | yes      | Bearer token for the emissions provider   |
//! | `CLIMATIQ_BASE_URL`     | no       | Provider base URL (default: production)   |
//! | `EMISSION_FACTORS_FILE` | no       | JSON selector table replacing the default |

use std::env;
use std::path::{Path, PathBuf};

use crate::emissions::SelectorTable;
use crate::error::{ConfigError, ConfigResult};

pub const API_KEY_VAR: &str = "CLIMATIQ_API_KEY";
pub const BASE_URL_VAR: &str = "CLIMATIQ_BASE_URL";
pub const FACTORS_FILE_VAR: &str = "EMISSION_FACTORS_FILE";

/// Production provider endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.climatiq.io";

/// Default HTTP port for `serve`.
pub const DEFAULT_PORT: u16 = 3000;

/// Runtime settings.
///
/// A missing API key is not an error here: the server must still start and
/// answer every emissions request with a configuration error, so the key is
/// only demanded by [`Settings::api_key`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub selectors: SelectorTable,
}

impl Settings {
    /// Load settings from the environment.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let factors_file = non_empty_var(FACTORS_FILE_VAR).map(PathBuf::from);
        Self::load(factors_file.as_deref())
    }

    /// Load settings, overriding the selector table file.
    pub fn load(factors_file: Option<&Path>) -> ConfigResult<Self> {
        let selectors = match factors_file {
            Some(path) => SelectorTable::load(path)?,
            None => SelectorTable::calibrated(),
        };

        Ok(Self {
            api_key: non_empty_var(API_KEY_VAR),
            base_url: non_empty_var(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            selectors,
        })
    }

    /// Settings with an explicit key, for tests and embedding.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            selectors: SelectorTable::calibrated(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The provider API key, or the fatal configuration error.
    pub fn api_key(&self) -> ConfigResult<&str> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
