//! Application configuration for lipidsort.
//!
//! User config lives at `~/.lipidsort/lipidsort.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LipidSortError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lipidsort.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lipidsort";

// ---------------------------------------------------------------------------
// Config structs (matching lipidsort.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Classification oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Convergence loop settings.
    #[serde(default)]
    pub sorting: SortingConfig,

    /// Default file locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// LipidMaps REST settings.
    #[serde(default)]
    pub lipidmaps: LipidMapsConfig,
}

/// `[oracle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_oracle_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// System message sent with every prompt.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Per-request timeout.
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

impl OracleConfig {
    /// Parse `base_url`, rejecting anything that is not an absolute URL.
    pub fn parsed_base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            LipidSortError::config(format!("invalid oracle base_url '{}': {e}", self.base_url))
        })
    }
}

fn default_oracle_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_system_prompt() -> String {
    "You are sorting significant compounds from a mass spectrometer analysis.".into()
}
fn default_oracle_timeout() -> u64 {
    300
}

/// `[sorting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortingConfig {
    /// Upper bound on repair passes after the first pass.
    #[serde(default = "default_max_repair_passes")]
    pub max_repair_passes: u32,
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            max_repair_passes: default_max_repair_passes(),
        }
    }
}

fn default_max_repair_passes() -> u32 {
    5
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Compound list to sort, one raw name per line.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Group sink written by `sort`.
    #[serde(default = "default_sink")]
    pub sink: PathBuf,

    /// Prompt/reply transcript.
    #[serde(default = "default_transcript")]
    pub transcript: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            sink: default_sink(),
            transcript: default_transcript(),
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("LipidMaps.txt")
}
fn default_sink() -> PathBuf {
    PathBuf::from("PostGPT.txt")
}
fn default_transcript() -> PathBuf {
    PathBuf::from("logs").join("final_conversation.log")
}

/// `[lipidmaps]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipidMapsConfig {
    /// LipidMaps site root.
    #[serde(default = "default_lipidmaps_url")]
    pub base_url: String,

    /// Minimum ms between consecutive formula lookups.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_lipidmaps_timeout")]
    pub timeout_secs: u64,
}

impl Default for LipidMapsConfig {
    fn default() -> Self {
        Self {
            base_url: default_lipidmaps_url(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_lipidmaps_timeout(),
        }
    }
}

fn default_lipidmaps_url() -> String {
    "https://lipidmaps.org".into()
}
fn default_rate_limit() -> u64 {
    100
}
fn default_lipidmaps_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lipidsort/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LipidSortError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lipidsort/lipidsort.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LipidSortError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LipidSortError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LipidSortError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LipidSortError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LipidSortError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the oracle API key env var is set and non-empty, returning it.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.oracle.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LipidSortError::config(format!(
            "oracle API key not found. Set the {var_name} environment variable."
        ))),
    }
}
