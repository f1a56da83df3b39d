// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config implementation.

use super::discovery::config_paths;
use crate::errors::ConfigError;
use camino::Utf8Path;
use serde::Deserialize;
use std::{collections::BTreeSet, fmt, io, time::Duration};
use tracing::{debug, warn};

/// Special value for `--config-file` and `SAUCE_ANNOTATE_CONFIG_FILE` that skips config file
/// loading entirely.
pub const CONFIG_NONE: &str = "none";

/// The default Sauce REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://saucelabs.com/rest/v1";

/// The default timeout for a single request to the Sauce REST API.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable for the Sauce username.
pub const USERNAME_ENV: &str = "SAUCE_USERNAME";

/// Environment variable for the Sauce access key.
pub const ACCESS_KEY_ENV: &str = "SAUCE_ACCESS_KEY";

/// Environment variable for the Sauce REST API endpoint.
pub const API_URL_ENV: &str = "SAUCE_API_URL";

/// Specifies where to load the config file from.
#[derive(Clone, Copy, Debug)]
pub enum ConfigLocation<'a> {
    /// Discover the config file from default locations (e.g.
    /// `~/.config/sauce-annotate/config.toml`).
    Default,

    /// Skip config file loading entirely, using only built-in defaults, the environment and
    /// command-line arguments.
    Isolated,

    /// Load the config file from an explicit path.
    ///
    /// Returns an error if the file does not exist.
    Explicit(&'a Utf8Path),
}

impl<'a> ConfigLocation<'a> {
    /// Creates a config location from a CLI or environment variable value.
    ///
    /// Returns `Default` if `None`, `Isolated` if `"none"`, otherwise `Explicit` with the path.
    pub fn from_cli_or_env(s: Option<&'a str>) -> Self {
        match s {
            None => Self::Default,
            Some(s) if s == CONFIG_NONE => Self::Isolated,
            Some(s) => Self::Explicit(Utf8Path::new(s)),
        }
    }
}

/// A Sauce access key.
///
/// The key is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey(String);

impl AccessKey {
    /// Creates a new access key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key itself.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessKey(<redacted>)")
    }
}

/// Settings that take precedence over the config file, provided by the environment or on the
/// command line.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// The Sauce username.
    pub username: Option<String>,

    /// The Sauce access key.
    pub access_key: Option<AccessKey>,

    /// The Sauce REST API endpoint.
    pub api_url: Option<String>,
}

impl ConfigOverrides {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_fn(|name| std::env::var(name).ok())
    }

    /// Reads overrides using the given environment lookup function.
    ///
    /// Empty values are treated as unset.
    pub fn from_env_fn(mut get: impl FnMut(&str) -> Option<String>) -> Self {
        let mut get_non_empty = |name: &str| get(name).filter(|value| !value.is_empty());
        Self {
            username: get_non_empty(USERNAME_ENV),
            access_key: get_non_empty(ACCESS_KEY_ENV).map(AccessKey::new),
            api_url: get_non_empty(API_URL_ENV),
        }
    }

    /// Combines two sets of overrides. Settings in `self` win over settings in `lower`.
    pub fn or(self, lower: Self) -> Self {
        Self {
            username: self.username.or(lower.username),
            access_key: self.access_key.or(lower.access_key),
            api_url: self.api_url.or(lower.api_url),
        }
    }
}

/// Resolved Sauce OnDemand configuration, ready to construct a client with.
#[derive(Clone, Debug)]
pub struct SauceConfig {
    /// The Sauce username.
    pub username: String,

    /// The Sauce access key.
    pub access_key: AccessKey,

    /// The Sauce REST API endpoint, without a trailing slash.
    pub api_url: String,

    /// The timeout for a single request.
    pub timeout: Duration,
}

impl SauceConfig {
    /// Creates a configuration with the given credentials and default settings.
    pub fn new(username: impl Into<String>, access_key: AccessKey) -> Self {
        Self {
            username: username.into(),
            access_key,
            api_url: DEFAULT_API_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Loads the config file from the given location and resolves it against `overrides`.
    pub fn load(
        location: ConfigLocation<'_>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let file = DeserializedConfig::from_location(location, &mut DefaultConfigWarnings)?;
        Self::resolve(file.unwrap_or_default().sauce, overrides)
    }

    fn resolve(
        file: DeserializedSauceConfig,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let username = overrides
            .username
            .or(file.username)
            .ok_or(ConfigError::Missing {
                setting: "username",
                config_key: "username",
                env_var: USERNAME_ENV,
                flag: "--username",
            })?;
        let access_key = overrides
            .access_key
            .or(file.access_key.map(AccessKey::new))
            .ok_or(ConfigError::Missing {
                setting: "access key",
                config_key: "access-key",
                env_var: ACCESS_KEY_ENV,
                flag: "--access-key",
            })?;
        let api_url = overrides
            .api_url
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());

        Ok(Self {
            username,
            access_key,
            api_url: api_url.trim_end_matches('/').to_owned(),
            timeout: file.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

/// Trait for handling config warnings.
///
/// This allows warnings to be logged (the default behavior) or collected for testing.
trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

/// Logs config warnings using the tracing crate.
struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if let [key] = Vec::from_iter(unknown).as_slice() {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.push_str(key);
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

/// The config file (deserialized form).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedConfig {
    /// Sauce OnDemand account settings.
    #[serde(default)]
    sauce: DeserializedSauceConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedSauceConfig {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    access_key: Option<String>,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

impl DeserializedConfig {
    fn from_location(
        location: ConfigLocation<'_>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Option<Self>, ConfigError> {
        match location {
            ConfigLocation::Isolated => {
                debug!("config: skipping (isolated)");
                Ok(None)
            }
            ConfigLocation::Explicit(path) => {
                debug!("config: loading from explicit path {path}");
                match Self::from_path_with_warnings(path, warnings)? {
                    Some(config) => Ok(Some(config)),
                    None => Err(ConfigError::Read {
                        path: path.to_owned(),
                        error: io::Error::new(io::ErrorKind::NotFound, "config file not found"),
                    }),
                }
            }
            ConfigLocation::Default => {
                for path in config_paths()? {
                    if let Some(config) = Self::from_path_with_warnings(&path, warnings)? {
                        return Ok(Some(config));
                    }
                }
                debug!("config: no config file found in default locations");
                Ok(None)
            }
        }
    }

    /// Loads config from a specific path.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    fn from_path_with_warnings(
        path: &Utf8Path,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Option<Self>, ConfigError> {
        debug!("config: attempting to load from {path}");
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("config: file does not exist at {path}");
                return Ok(None);
            }
            Err(error) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    error,
                });
            }
        };

        let (config, unknown) =
            Self::deserialize_toml(&contents).map_err(|error| ConfigError::Parse {
                path: path.to_owned(),
                error,
            })?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(path, &unknown);
        }

        debug!("config: loaded successfully from {path}");
        Ok(Some(config))
    }

    /// Deserializes TOML content and returns the config along with any unknown keys.
    fn deserialize_toml(contents: &str) -> Result<(Self, BTreeSet<String>), toml::de::Error> {
        let deserializer = toml::Deserializer::parse(contents)?;
        let mut unknown = BTreeSet::new();
        let config: DeserializedConfig = serde_ignored::deserialize(deserializer, |path| {
            unknown.insert(path.to_string());
        })?;
        Ok((config, unknown))
    }
}
