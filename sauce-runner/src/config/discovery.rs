// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of the config file location.

use crate::errors::ConfigError;
use camino::Utf8PathBuf;
use etcetera::{BaseStrategy, HomeDirError, base_strategy::Xdg};

static CONFIG_DIR_NAME: &str = "sauce-annotate";
static CONFIG_FILE_NAME: &str = "config.toml";

/// Returns candidate paths for the config file, in order of priority.
///
/// The caller should check each path in order and use the first one that exists.
pub fn config_paths() -> Result<Vec<Utf8PathBuf>, ConfigError> {
    let mut paths = Vec::new();

    // On Windows, try the native path first.
    #[cfg(windows)]
    if let Some(path) = native_config_path()? {
        paths.push(path);
    }

    if let Some(path) = xdg_config_path()? {
        paths.push(path);
    }

    Ok(paths)
}

fn xdg_config_path() -> Result<Option<Utf8PathBuf>, ConfigError> {
    let strategy = match Xdg::new() {
        Ok(s) => s,
        Err(HomeDirError) => return Ok(None),
    };

    let config_path = strategy
        .config_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);

    Utf8PathBuf::try_from(config_path)
        .map(Some)
        .map_err(|error| ConfigError::NonUtf8Path { error })
}

#[cfg(windows)]
fn native_config_path() -> Result<Option<Utf8PathBuf>, ConfigError> {
    use etcetera::base_strategy::Windows;

    let strategy = match Windows::new() {
        Ok(s) => s,
        Err(HomeDirError) => return Ok(None),
    };

    let config_path = strategy
        .config_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);

    Utf8PathBuf::try_from(config_path)
        .map(Some)
        .map_err(|error| ConfigError::NonUtf8Path { error })
}
