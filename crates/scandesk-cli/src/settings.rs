//! Loading [`ScanConfig`] from files and the environment.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `config/scandesk.toml` (optional), or the file given with `--config`
//! 3. `SCANDESK_*` environment variables, nested with `__`
//!    (e.g. `SCANDESK_ASSIGNMENT__MODE=round_robin`)
//!
//! `main` reads a `.env` file from the working directory into the
//! environment before anything is loaded.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use scandesk_core::config::ScanConfig;

const DEFAULT_CONFIG_FILE: &str = "config/scandesk";
const ENV_PREFIX: &str = "SCANDESK";

/// Load the configuration, taking overrides from the process environment.
pub fn load(path: Option<&Path>) -> Result<ScanConfig, ConfigError> {
    load_with_overrides(path, None)
}

/// Load the configuration with `overrides` (dotted keys such as
/// `dedup.enabled`) in place of the process environment.
pub fn load_with_overrides(
    path: Option<&Path>,
    overrides: Option<HashMap<String, String>>,
) -> Result<ScanConfig, ConfigError> {
    let mut builder = Config::builder();

    builder = match path {
        Some(path) => builder.add_source(File::from(path).required(true)),
        None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    if let Some(vars) = overrides {
        for (key, value) in vars {
            builder = builder.set_override(key, value)?;
        }
    } else {
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );
    }

    builder.build()?.try_deserialize()
}
