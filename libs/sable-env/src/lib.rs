// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Access to `SABLE_*` configuration values.
//!
//! Configuration is read through an [`Environment`] so tests can hand in a [`MapEnvironment`]
//! instead of mutating the process environment.

use std::collections::HashMap;

/// Prefix shared by every configuration key the framework reads.
pub const KEY_PREFIX: &str = "SABLE_";

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or_else(|| default_value.to_string())
    }

    /// Parse a non-negative integer value. An unset key yields `Ok(None)`.
    fn get_usize(&self, key: &str) -> Result<Option<usize>, EnvError> {
        self.get(key)
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| EnvError::InvalidNumber {
                        key: key.to_string(),
                        value,
                    })
            })
            .transpose()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("Invalid value for {key}: {value}. Expected a non-negative integer")]
    InvalidNumber { key: String, value: String },
}

/// A fixed set of configuration values.
#[derive(Clone, Debug, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the `SABLE_*` variables of the running process.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: vars
                .into_iter()
                .filter(|(key, _)| key.starts_with(KEY_PREFIX))
                .collect(),
        }
    }
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_framework_keys() {
        let env = MapEnvironment::from_vars([
            ("SABLE_HTTP_PATH_PREFIX".to_string(), "api".to_string()),
            ("SABLE_COMPILE_CACHE_LIMIT".to_string(), "16".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);

        assert_eq!(env.get("SABLE_HTTP_PATH_PREFIX").as_deref(), Some("api"));
        assert_eq!(env.get_usize("SABLE_COMPILE_CACHE_LIMIT").unwrap(), Some(16));
        assert_eq!(env.get("PATH"), None);
    }

    #[test]
    fn process_snapshot_is_filtered() {
        let env = MapEnvironment::from_process();
        assert!(env.values.keys().all(|key| key.starts_with(KEY_PREFIX)));
    }

    #[test]
    fn parses_numbers() {
        let env = MapEnvironment::from([
            ("SABLE_COMPILE_CACHE_LIMIT", " 64 "),
            ("SABLE_BAD_LIMIT", "-1"),
        ]);

        assert_eq!(env.get_usize("SABLE_COMPILE_CACHE_LIMIT").unwrap(), Some(64));
        assert_eq!(env.get_usize("SABLE_MISSING").unwrap(), None);
        assert_eq!(env.get_or_else("SABLE_MISSING", "fallback"), "fallback");
        assert!(matches!(
            env.get_usize("SABLE_BAD_LIMIT"),
            Err(EnvError::InvalidNumber { .. })
        ));
    }
}
