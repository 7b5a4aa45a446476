pub mod convert;
pub mod decode;
pub mod info;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use dataflow_pqt::ConvertConfig;

pub fn load_config(path: Option<&Path>) -> Result<ConvertConfig> {
    let Some(path) = path else {
        return Ok(ConvertConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    ConvertConfig::from_json_str(&text)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Flags only ever switch settings on, so an unset flag keeps the file value.
pub fn with_overrides(
    mut config: ConvertConfig,
    keep_originals: bool,
    dataflows_dir: Option<String>,
) -> ConvertConfig {
    config.keep_originals |= keep_originals;
    if let Some(name) = dataflows_dir {
        config.dataflows_dir_name = name;
    }
    config
}
