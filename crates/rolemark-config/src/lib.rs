// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod schema;
mod loader;

pub use schema::*;
pub use loader::{load, load_settings_file, parse_settings, SettingsFormat};
