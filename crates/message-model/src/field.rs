// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use bytes::Bytes;
use heck::ToLowerCamelCase;
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    converter::Converter,
    converters,
    error::ModelError,
    message::{Message, MessageType},
    native_type::NativeType,
    schema::Schema,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
}

impl ScalarType {
    pub fn native_type(&self) -> NativeType {
        match self {
            ScalarType::Bool => NativeType::Bool,
            ScalarType::Int32 => NativeType::Int32,
            ScalarType::Int64 => NativeType::Int64,
            ScalarType::Float32 => NativeType::Float32,
            ScalarType::Float64 => NativeType::Float64,
            ScalarType::String => NativeType::String,
            ScalarType::Bytes => NativeType::Bytes,
        }
    }

    pub fn zero_value(&self) -> Value {
        match self {
            ScalarType::Bool => Value::Bool(false),
            ScalarType::Int32 | ScalarType::Int64 => Value::Int(0),
            ScalarType::Float32 | ScalarType::Float64 => Value::Float(0.0),
            ScalarType::String => Value::String(String::new()),
            ScalarType::Bytes => Value::Bytes(Bytes::new()),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::Int32 | ScalarType::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }
}

/// A reference to a message type that may be bound after the referring type is built.
///
/// References created with [`MessageRef::named`] start out unbound; a
/// [`crate::registry::MessageRegistry`] binds them once every declared type exists. All clones
/// of a reference share the binding.
#[derive(Clone)]
pub struct MessageRef {
    name: String,
    target: Arc<OnceLock<MessageType>>,
}

impl MessageRef {
    pub fn to(message_type: &MessageType) -> Self {
        Self {
            name: message_type.name().to_string(),
            target: Arc::new(OnceLock::from(message_type.clone())),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: Arc::new(OnceLock::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> Option<&MessageType> {
        self.target.get()
    }

    pub fn message_type(&self) -> Result<&MessageType, ModelError> {
        self.get()
            .ok_or_else(|| ModelError::UnresolvedReference(self.name.clone()))
    }

    pub(crate) fn bind(&self, message_type: &MessageType) {
        // Already-bound references keep their target
        let _ = self.target.set(message_type.clone());
    }
}

impl Debug for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the target: self-referencing types would recurse
        write!(f, "MessageRef({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(ScalarType),
    Message(MessageRef),
    Repeated(Box<FieldKind>),
    /// String-keyed map
    Map(Box<FieldKind>),
    Converter(Arc<dyn Converter>),
}

impl FieldKind {
    pub fn message(message_type: &MessageType) -> Self {
        FieldKind::Message(MessageRef::to(message_type))
    }

    pub fn message_named(name: impl Into<String>) -> Self {
        FieldKind::Message(MessageRef::named(name))
    }

    pub fn repeated(item: FieldKind) -> Self {
        FieldKind::Repeated(Box::new(item))
    }

    pub fn map(value: FieldKind) -> Self {
        FieldKind::Map(Box::new(value))
    }

    pub fn converter(converter: Arc<dyn Converter>) -> Self {
        FieldKind::Converter(converter)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, FieldKind::Repeated(_) | FieldKind::Map(_))
    }

    /// The item kind for repeated and map fields, the kind itself otherwise.
    pub fn item_kind(&self) -> &FieldKind {
        match self {
            FieldKind::Repeated(item) | FieldKind::Map(item) => item,
            _ => self,
        }
    }

    pub fn native_type(&self) -> NativeType {
        match self {
            FieldKind::Scalar(scalar) => scalar.native_type(),
            FieldKind::Message(message_ref) => match message_ref.get() {
                Some(message_type) => NativeType::Message(message_type.clone()),
                None => NativeType::Named(message_ref.name().to_string()),
            },
            FieldKind::Repeated(item) => NativeType::list(item.native_type()),
            FieldKind::Map(value) => NativeType::map(value.native_type()),
            FieldKind::Converter(converter) => converter.native().clone(),
        }
    }

    pub fn zero_value(&self) -> Value {
        match self {
            FieldKind::Scalar(scalar) => scalar.zero_value(),
            FieldKind::Message(message_ref) => message_ref
                .get()
                .map(|message_type| Value::Message(Message::new(message_type)))
                .unwrap_or(Value::Null),
            FieldKind::Repeated(_) => Value::List(vec![]),
            FieldKind::Map(_) => Value::Map(IndexMap::new()),
            FieldKind::Converter(converter) => converter
                .resolve(&Message::new(converter.wire()))
                .unwrap_or(Value::Null),
        }
    }

    /// Message references reachable from this kind (without crossing into other messages).
    pub(crate) fn references(&self) -> Vec<&MessageRef> {
        match self {
            FieldKind::Message(message_ref) => vec![message_ref],
            FieldKind::Repeated(item) | FieldKind::Map(item) => item.references(),
            FieldKind::Scalar(_) | FieldKind::Converter(_) => vec![],
        }
    }
}

/// Declaration of one field, consumed by [`crate::message::MessageBuilder`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    json_name: Option<String>,
    schema: Schema,
    default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            json_name: None,
            schema: Schema::default(),
            default: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Bool))
    }

    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Int32))
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Int64))
    }

    pub fn float32(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Float32))
    }

    pub fn float64(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Float64))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::String))
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Bytes))
    }

    pub fn message(name: impl Into<String>, message_type: &MessageType) -> Self {
        Self::new(name, FieldKind::message(message_type))
    }

    /// A nested message referenced by name, bound later by a message registry.
    pub fn message_named(name: impl Into<String>, message_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::message_named(message_name))
    }

    pub fn repeated(name: impl Into<String>, item: FieldKind) -> Self {
        Self::new(name, FieldKind::repeated(item))
    }

    pub fn map(name: impl Into<String>, value: FieldKind) -> Self {
        Self::new(name, FieldKind::map(value))
    }

    pub fn converter(name: impl Into<String>, converter: Arc<dyn Converter>) -> Self {
        Self::new(name, FieldKind::Converter(converter))
    }

    /// A `DateTime<Utc>` field carried as a `Timestamp` on the wire.
    pub fn date_time(name: impl Into<String>) -> Self {
        Self::converter(name, converters::date_time_converter())
    }

    /// A `NaiveDate` field carried as a `Timestamp` (at UTC midnight) on the wire.
    pub fn date(name: impl Into<String>) -> Self {
        Self::converter(name, converters::date_converter())
    }

    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    json_name: String,
    kind: FieldKind,
    schema: Schema,
    pattern: Option<Regex>,
    default: Option<Value>,
}

impl FieldDescriptor {
    pub(crate) fn build(spec: FieldSpec, message_name: &str) -> Result<Self, ModelError> {
        let FieldSpec {
            name,
            kind,
            json_name,
            schema,
            default,
        } = spec;

        if let FieldKind::Repeated(item) | FieldKind::Map(item) = &kind
            && item.is_container()
        {
            return Err(ModelError::NestedRepeated {
                message: message_name.to_string(),
                field: name,
            });
        }

        check_schema(&kind, &schema, message_name, &name)?;

        let pattern = schema
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ModelError::InvalidPattern {
                message: message_name.to_string(),
                field: name.clone(),
                error: e.to_string(),
            })?;

        // References may still be unbound here; message defaults are checked once they resolve
        let default = match default {
            Some(value) if kind.references().iter().all(|r| r.get().is_some()) => Some(
                kind.native_type()
                    .coerce(value)
                    .map_err(|value| ModelError::InvalidDefault {
                        message: message_name.to_string(),
                        field: name.clone(),
                        error: format!("{value} is not of type '{}'", kind.native_type()),
                    })?,
            ),
            other => other,
        };

        let json_name = json_name.unwrap_or_else(|| name.to_lower_camel_case());

        Ok(Self {
            name,
            json_name,
            kind,
            schema,
            pattern,
            default,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used on the wire (lower camel case of the name unless overridden).
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The compiled `pattern` constraint, if any.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    pub fn native_type(&self) -> NativeType {
        self.kind.native_type()
    }

    /// Repeated and map fields both count as repeated.
    pub fn is_repeated(&self) -> bool {
        self.kind.is_container()
    }

    /// Map fields are always string-keyed.
    pub fn key_type(&self) -> Option<ScalarType> {
        match self.kind {
            FieldKind::Map(_) => Some(ScalarType::String),
            _ => None,
        }
    }

    /// The explicit default or else the zero value of the field's type.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(value) => value.clone(),
            None => self.kind.zero_value(),
        }
    }

    /// Check a default that could not be checked while its message reference was unbound.
    pub(crate) fn verify_default(&self, message_name: &str) -> Result<(), ModelError> {
        match &self.default {
            Some(default) if !self.native_type().accepts(default) => {
                Err(ModelError::InvalidDefault {
                    message: message_name.to_string(),
                    field: self.name.clone(),
                    error: format!("{default} is not of type '{}'", self.native_type()),
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn coerce(&self, value: Value) -> Result<Value, ModelError> {
        let native_type = self.native_type();
        native_type
            .coerce(value)
            .map_err(|value| ModelError::TypeMismatch {
                field: self.name.clone(),
                expected: native_type.to_string(),
                actual: format!("{value} ({})", value.type_name()),
            })
    }
}

fn check_schema(
    kind: &FieldKind,
    schema: &Schema,
    message_name: &str,
    field_name: &str,
) -> Result<(), ModelError> {
    if schema.is_empty() {
        return Ok(());
    }

    let item_kind = kind.item_kind();

    let (length_allowed, number_allowed) = match item_kind {
        FieldKind::Scalar(ScalarType::String | ScalarType::Bytes) => (true, false),
        FieldKind::Scalar(scalar) if scalar.is_integer() || scalar.is_float() => (false, true),
        _ => (false, false),
    };
    let items_allowed = matches!(kind, FieldKind::Repeated(_));
    let properties_allowed = matches!(kind, FieldKind::Map(_));

    let incompatible = |constraint: &str| ModelError::IncompatibleSchema {
        message: message_name.to_string(),
        field: field_name.to_string(),
        constraint: constraint.to_string(),
        field_type: kind.native_type().to_string(),
    };

    let groups: [(bool, bool, &[&str]); 4] = [
        (
            schema.has_length_constraints(),
            length_allowed,
            &["minLength", "maxLength", "pattern"],
        ),
        (
            schema.has_number_constraints(),
            number_allowed,
            &["minimum", "maximum"],
        ),
        (
            schema.has_item_constraints(),
            items_allowed,
            &["minItems", "maxItems", "uniqueItems"],
        ),
        (
            schema.has_property_constraints(),
            properties_allowed,
            &["minProperties", "maxProperties"],
        ),
    ];

    for (present, allowed, names) in groups {
        if present && !allowed {
            let constraint = schema
                .constraint_names()
                .into_iter()
                .find(|name| names.contains(name))
                .unwrap_or(names[0]);
            return Err(incompatible(constraint));
        }
    }

    Ok(())
}
