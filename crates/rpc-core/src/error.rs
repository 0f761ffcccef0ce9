// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use message_model::ModelError;
use thiserror::Error;

/// A handler or service that cannot be turned into RPC methods. Raised while building a service,
/// never while serving requests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error(
        "Unable to infer a request message for '{method}': declare one or enable auto-generation"
    )]
    MissingRequest { method: String },

    #[error("Unexpected required argument in '{method}': '{name}'")]
    UnexpectedRequiredArgument { method: String, name: String },

    #[error("Unexpected required argument in '{method}': '{name}' is not a field of {message}")]
    NotAField {
        method: String,
        name: String,
        message: String,
    },

    #[error("Bad argument in '{method}': '{name}' should be {expected}, but got {actual}")]
    BadArgument {
        method: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Unable to coerce request message {wire} to {native} in '{method}'")]
    NoRequestConverter {
        method: String,
        native: String,
        wire: String,
    },

    #[error("Unable to coerce return value {native} to wire format in '{method}'")]
    NoResponseConverter { method: String, native: String },

    #[error("Unable to generate a request field for '{name}' of type {native} in '{method}'")]
    UnsupportedParameterType {
        method: String,
        name: String,
        native: String,
    },

    #[error("'{method}' takes {expected} resolved argument(s) but declares only {actual} parameter(s)")]
    MissingResolverParameter {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("Resolved argument '{name}' in '{method}' should be {expected}, but got {actual}")]
    ResolverMismatch {
        method: String,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Method '{method}' is defined more than once in service '{service}'")]
    DuplicateMethod { service: String, method: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}
