//! # barpi-settings
//!
//! Layered configuration for the Bar-Pi backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BarPiSettings::default()`]
//! 2. **Settings file**: `~/.barpi/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `SERVER_PORT`, `JWT_SECRET`, `WS_*`, ...
//!
//! The loaded value is validated before it is handed to the server.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
