// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use sable_env::{EnvError, Environment};

pub const SABLE_LOG: &str = "SABLE_LOG";

pub const SABLE_HTTP_PATH_PREFIX: &str = "SABLE_HTTP_PATH_PREFIX";

pub const SABLE_COMPILE_CACHE_LIMIT: &str = "SABLE_COMPILE_CACHE_LIMIT";

/// Prefix mounted in front of every route. Normalized to either "" or "/something" (no trailing
/// slash).
pub fn get_http_path_prefix(env: &dyn Environment) -> String {
    let prefix = env.get_or_else(SABLE_HTTP_PATH_PREFIX, "");
    let prefix = prefix.trim().trim_end_matches('/');

    if prefix.is_empty() {
        String::new()
    } else if prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{prefix}")
    }
}

/// Maximum number of compiled codecs (or validators) memoized per registry. `None` means
/// unbounded.
pub fn get_compile_cache_limit(env: &dyn Environment) -> Result<Option<usize>, EnvError> {
    env.get_usize(SABLE_COMPILE_CACHE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_env::MapEnvironment;

    #[test]
    fn normalizes_path_prefix() {
        let expected = [("", ""), ("/", ""), ("api", "/api"), ("/api/v1/", "/api/v1")];

        for (value, expected) in expected {
            let env = MapEnvironment::from([(SABLE_HTTP_PATH_PREFIX, value)]);
            assert_eq!(get_http_path_prefix(&env), expected, "prefix {value:?}");
        }

        assert_eq!(get_http_path_prefix(&MapEnvironment::new()), "");
    }

    #[test]
    fn cache_limit() {
        assert_eq!(
            get_compile_cache_limit(&MapEnvironment::new()).unwrap(),
            None
        );

        let env = MapEnvironment::from([(SABLE_COMPILE_CACHE_LIMIT, "128")]);
        assert_eq!(get_compile_cache_limit(&env).unwrap(), Some(128));
    }
}
