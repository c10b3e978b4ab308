//! Assembler configuration: node defaults that are not carried by the metadata itself.
//!
//! Config files are YAML (`.yaml`/`.yml`) or JSON (`.json`), chosen by extension.
//! Every field is optional; missing fields keep their defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "META2WORKFLOW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Checkpoint used when neither an override nor the metadata names one.
    pub default_checkpoint: String,
    pub filename_prefix: String,
    /// Image path placed in the img2img `LoadImage` node.
    pub input_image: String,
    pub img2img_denoise: f64,
    pub upscale_method: String,
    pub batch_size: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_checkpoint: "sd_xl_base_1.0.safetensors".to_string(),
            filename_prefix: "ComfyUI".to_string(),
            input_image: "input_image_placeholder".to_string(),
            img2img_denoise: 0.7,
            upscale_method: "nearest-exact".to_string(),
            batch_size: 1,
        }
    }
}

impl WorkflowConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }),
            _ => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolves the config from an explicit path, then `META2WORKFLOW_CONFIG`, then defaults.
    ///
    /// Unreadable or invalid files are logged and replaced by the defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let Some(path) = path else {
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                log::info!("Loaded workflow config from {}", path.display());
                config
            }
            Err(error) => {
                log::warn!("{}; using default workflow config", error);
                Self::default()
            }
        }
    }
}
