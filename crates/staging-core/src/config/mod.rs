//! Process-wide staging settings
//!
//! Settings are read from `staging.toml`, by default in the user's
//! configuration directory. Every field has a default, so a missing file is
//! equivalent to an empty one.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_settings, parse_settings_str, to_toml};
pub use paths::{default_settings_path, settings_path};
pub use schema::{StagingSettings, parse_octal_mode};
pub use store::SettingsStore;
