// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{fmt::Debug, sync::Arc};

use crate::{
    error::ModelError,
    message::{Message, MessageType},
    native_type::NativeType,
    value::Value,
};

/// A stateless, bidirectional mapping between one wire message type and one native type.
pub trait Converter: Send + Sync + Debug {
    fn wire(&self) -> &MessageType;

    fn native(&self) -> &NativeType;

    /// Wire message to native value
    fn resolve(&self, message: &Message) -> Result<Value, ModelError>;

    /// Native value to wire message
    fn format(&self, value: &Value) -> Result<Message, ModelError>;
}

/// The first converter producing exactly `native` (and, if given, carried as `wire`).
pub fn find_converter<'a>(
    converters: &'a [Arc<dyn Converter>],
    native: &NativeType,
    wire: Option<&MessageType>,
) -> Option<&'a Arc<dyn Converter>> {
    converters.iter().find(|converter| {
        converter.native() == native && wire.is_none_or(|wire| converter.wire() == wire)
    })
}
