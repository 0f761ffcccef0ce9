// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::{error::RpcError, path::FieldPath};
use message_model::{ModelError, Value};
use thiserror::Error;

/// A message that could not be written in a wire format. Unlike decode errors this is a
/// server-side fault.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{description}")]
pub struct EncodeError {
    pub description: String,
    pub path: FieldPath,
}

impl EncodeError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            path: FieldPath::new(),
        }
    }

    pub(crate) fn type_mismatch(value: &Value, expected: &str) -> Self {
        Self::new(format!("{value} cannot be encoded as '{expected}'"))
    }

    pub(crate) fn with_field(mut self, name: &str) -> Self {
        self.path.prepend(name);
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.path.prepend(index);
        self
    }
}

impl From<ModelError> for EncodeError {
    fn from(error: ModelError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<EncodeError> for RpcError {
    fn from(error: EncodeError) -> Self {
        let mut rpc_error = RpcError::server_error(format!("Failed to encode: {}", error.description));
        rpc_error.path = error.path;
        rpc_error
    }
}
