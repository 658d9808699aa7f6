//! Configuration loading, validation, and env substitution.
//!
//! Config files: `autocron.toml`, `autocron.yaml`, or `autocron.json`
//! Searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, find_config_file, load_config, load_or_discover},
    schema::{AutocronConfig, JobConfig, StoreConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
