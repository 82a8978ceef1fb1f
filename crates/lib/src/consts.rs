//! Crate-wide constants.

/// Application name, used for platform directory names.
pub const APP_NAME: &str = "vigil";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "VIGIL_DATA_DIR";

/// Exported to installer, override script, and build command: environment prefix.
pub const ENV_PREFIX: &str = "VIGIL_PREFIX";

/// Exported to installer, override script, and build command: runtime version.
pub const ENV_RUNTIME: &str = "VIGIL_RUNTIME";

/// Exported to override script and build command: environment name.
pub const ENV_NAME: &str = "VIGIL_ENV_NAME";
