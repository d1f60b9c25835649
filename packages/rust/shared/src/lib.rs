//! Shared types, error model, and configuration for lipidsort.
//!
//! This crate is the foundation depended on by all other lipidsort crates.
//! It provides:
//! - [`LipidSortError`]: the unified error type
//! - Domain types ([`Compound`], [`NormalizationKey`], [`Group`], [`RunId`])
//! - The identifier normalizer ([`normalize`], [`normalize_group`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod normalize;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LipidMapsConfig, OracleConfig, PathsConfig, SortingConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{LipidSortError, Result};
pub use normalize::{normalize, normalize_group};
pub use types::{Compound, Group, NormalizationKey, RunId};
