// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::path::{FieldPath, PathSegment};

/// Request-time error categories, each with a fixed HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotImplemented,
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    Conflict,
    ServerError,
    /// A bad request that always carries a field path
    Validation,
    Cancelled,
    DeadlineExceeded,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            // Non-standard "client closed request"
            ErrorKind::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Map a received status back to a kind. A 400 with a path is a validation error.
    pub fn from_status(status: u16, has_path: bool) -> Self {
        match status {
            501 => ErrorKind::NotImplemented,
            404 => ErrorKind::NotFound,
            400 if has_path => ErrorKind::Validation,
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            409 => ErrorKind::Conflict,
            499 => ErrorKind::Cancelled,
            504 => ErrorKind::DeadlineExceeded,
            _ => ErrorKind::ServerError,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub kind: ErrorKind,
    pub description: String,
    pub path: FieldPath,
}

impl RpcError {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            path: FieldPath::new(),
        }
    }

    pub fn not_implemented(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, description)
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, description)
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, description)
    }

    pub fn unauthorized(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, description)
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, description)
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, description)
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerError, description)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request was cancelled")
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::DeadlineExceeded, "Request deadline exceeded")
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: self.status().as_u16(),
            description: self.description.clone(),
            path: self.path.to_string(),
        }
    }
}

impl Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.description)
        } else {
            write!(f, "{} (at '{}')", self.description, self.path)
        }
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The payload could not be parsed at all
    InvalidPayload,
    /// A value had the wrong type for its field
    TypeMismatch,
    /// A value violated a schema constraint
    ConstraintViolation,
}

/// A decode or validation failure located at a field path.
///
/// Created at the failing value with an empty path; every enclosing level calls
/// [`ValidationError::with_field`] or [`ValidationError::with_index`] on the way out.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub description: String,
    pub path: FieldPath,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            path: FieldPath::new(),
        }
    }

    pub fn invalid_payload(description: impl Display) -> Self {
        Self::new(
            ValidationErrorKind::InvalidPayload,
            format!("Invalid payload: {description}"),
        )
    }

    /// `'bad' is not of type 'object'`
    pub fn type_mismatch(actual: impl Display, expected: &str) -> Self {
        Self::new(
            ValidationErrorKind::TypeMismatch,
            format!("{actual} is not of type '{expected}'"),
        )
    }

    pub fn constraint(description: impl Into<String>) -> Self {
        Self::new(ValidationErrorKind::ConstraintViolation, description)
    }

    pub fn with_segment(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.prepend(segment);
        self
    }

    pub fn with_field(self, name: &str) -> Self {
        self.with_segment(name)
    }

    pub fn with_index(self, index: usize) -> Self {
        self.with_segment(index)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.description)
        } else {
            write!(f, "{} (at '{}')", self.description, self.path)
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for RpcError {
    fn from(error: ValidationError) -> Self {
        let kind = match error.kind {
            // A payload that cannot be parsed has no field to point at
            ValidationErrorKind::InvalidPayload => ErrorKind::BadRequest,
            _ => ErrorKind::Validation,
        };

        RpcError {
            kind,
            description: error.description,
            path: error.path,
        }
    }
}

/// The body rendered for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub description: String,
    #[serde(default)]
    pub path: String,
}

impl ErrorResponse {
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing a struct of strings and integers cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse an error body. Bodies that aren't in the expected shape are turned into a server
    /// error (or the kind implied by `status`) with the raw body as the description.
    pub fn from_bytes(status: u16, body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| ErrorResponse {
            status,
            description: String::from_utf8_lossy(body).into_owned(),
            path: String::new(),
        })
    }
}

impl From<ErrorResponse> for RpcError {
    fn from(response: ErrorResponse) -> Self {
        let path = FieldPath::parse(&response.path);
        RpcError {
            kind: ErrorKind::from_status(response.status, !path.is_empty()),
            description: response.description,
            path,
        }
    }
}
