//! Engine options loaded from an optional `compaudit.toml`.
//!
//! ```toml
//! max_body_lines = 400
//!
//! [models.aliases]
//! sonnet = "claude-sonnet-4-5"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CompauditError, Result};

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "compaudit.toml";

/// Engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Body line count above which a `body-too-long` warning is raised.
    #[serde(default = "default_max_body_lines")]
    pub max_body_lines: usize,
    #[serde(default)]
    pub models: ModelsConfig,
}

/// Model naming options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Mnemonic → version alias used when migrating command models.
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,
}

fn default_max_body_lines() -> usize {
    500
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("haiku", "claude-haiku-4-5"),
        ("sonnet", "claude-sonnet-4-5"),
        ("opus", "claude-opus-4-5"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_body_lines: default_max_body_lines(),
            models: ModelsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse TOML text. Aliases given in the file are merged over the
    /// defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: EngineConfig = toml::from_str(text).map_err(|e| CompauditError::Config {
            message: e.to_string(),
        })?;
        for (mnemonic, alias) in default_aliases() {
            config.models.aliases.entry(mnemonic).or_insert(alias);
        }
        Ok(config)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `compaudit.toml` in
    /// `cwd` is used when present, and defaults otherwise.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = cwd.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    debug!("no {CONFIG_FILE_NAME} found, using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|e| CompauditError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "loaded engine config");
        Self::from_toml_str(&text)
    }

    /// Version alias configured for a bare model mnemonic.
    #[must_use]
    pub fn version_alias(&self, mnemonic: &str) -> Option<&str> {
        self.models.aliases.get(mnemonic).map(String::as_str)
    }
}
