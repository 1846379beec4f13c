use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use docschema_core::Definitions;

use crate::CliError;

/// Contents of `docschema.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub definitions: Definitions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `DOCSCHEMA_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| CliError::InvalidConfig(format!("{}: {err}", path.display())))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<ConfigFile, CliError> {
    Ok(toml::from_str(content)?)
}
