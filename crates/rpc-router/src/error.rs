// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use sable_env::EnvError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("A different service named '{0}' is already registered")]
    DuplicateService(String),

    #[error("{verb} {path} is already served by '{existing}'")]
    DuplicateRoute {
        verb: String,
        path: String,
        existing: String,
    },

    #[error("Invalid route for '{method}': {error}")]
    InvalidRoute { method: String, error: String },

    #[error(transparent)]
    Env(#[from] EnvError),
}
