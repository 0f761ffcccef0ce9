// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Typed messages: field declarations, message types and instances, converters between wire
//! messages and native values, and the well-known message types shared by every codec.

pub mod cache;
pub mod converter;
pub mod converters;
pub mod error;
pub mod field;
pub mod message;
pub mod native_type;
pub mod registry;
pub mod schema;
pub mod value;
pub mod well_known;

pub use converter::Converter;
pub use error::ModelError;
pub use field::{FieldDescriptor, FieldKind, FieldSpec, MessageRef, ScalarType};
pub use message::{Message, MessageBuilder, MessageType, MessageTypeId, WireForm};
pub use native_type::NativeType;
pub use schema::{NumberBound, Schema};
pub use value::Value;
