// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The declared shape of a handler: its parameters (after the service receiver) and its return
//! type.

use message_model::{MessageType, NativeType, Value};

#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    native: NativeType,
    default: Option<Value>,
}

impl Param {
    pub fn required(name: impl Into<String>, native: NativeType) -> Self {
        Self {
            name: name.into(),
            native,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, native: NativeType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            native,
            default: Some(default.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native(&self) -> &NativeType {
        &self.native
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub enum ReturnType {
    /// Declared to return nothing
    None,
    /// No annotation; an explicit response message is trusted, otherwise the value is discarded
    #[default]
    Unannotated,
    Message(MessageType),
    Native(NativeType),
}

#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
    returns: ReturnType,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn required(self, name: impl Into<String>, native: NativeType) -> Self {
        self.param(Param::required(name, native))
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        native: NativeType,
        default: impl Into<Value>,
    ) -> Self {
        self.param(Param::optional(name, native, default))
    }

    /// Shorthand for a leading `request` parameter of the given message type.
    pub fn request(self, message_type: &MessageType) -> Self {
        self.required("request", NativeType::Message(message_type.clone()))
    }

    pub fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    pub fn returns_message(self, message_type: &MessageType) -> Self {
        self.returns(ReturnType::Message(message_type.clone()))
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_type(&self) -> &ReturnType {
        &self.returns
    }
}
