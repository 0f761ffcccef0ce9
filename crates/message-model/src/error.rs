// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate field '{field}' in message '{message}'")]
    DuplicateField { message: String, field: String },

    #[error(
        "Field '{field}' in message '{message}': repeated and map fields cannot hold repeated or map items"
    )]
    NestedRepeated { message: String, field: String },

    #[error("Field '{field}' in message '{message}': '{constraint}' cannot apply to a {field_type} field")]
    IncompatibleSchema {
        message: String,
        field: String,
        constraint: String,
        field_type: String,
    },

    #[error("Field '{field}' in message '{message}' has an invalid pattern: {error}")]
    InvalidPattern {
        message: String,
        field: String,
        error: String,
    },

    #[error("Field '{field}' in message '{message}' has an invalid default: {error}")]
    InvalidDefault {
        message: String,
        field: String,
        error: String,
    },

    #[error("Unresolved message reference '{0}'")]
    UnresolvedReference(String),

    #[error("Message '{message}' has no field '{field}'")]
    UnknownField { message: String, field: String },

    #[error("Field '{field}' expects a value of type '{expected}', got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Message '{message}' cannot use the {form} wire form: {reason}")]
    InvalidWireForm {
        message: String,
        form: String,
        reason: String,
    },

    #[error("Message '{0}' is declared more than once")]
    DuplicateMessage(String),

    #[error("Too many values for message '{message}': it has {expected} fields, got {actual} values")]
    TooManyValues {
        message: String,
        expected: usize,
        actual: usize,
    },
}
