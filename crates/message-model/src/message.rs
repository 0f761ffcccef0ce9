// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    fmt::{Debug, Display},
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use indexmap::IndexMap;

use crate::{
    error::ModelError,
    field::{FieldDescriptor, FieldKind, FieldSpec, MessageRef, ScalarType},
    value::Value,
};

static NEXT_MESSAGE_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a message type. Compiled codecs and validators are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTypeId(u64);

impl MessageTypeId {
    fn next() -> Self {
        MessageTypeId(NEXT_MESSAGE_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// How a message is represented by codecs that support alternative shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireForm {
    /// One key per present field
    #[default]
    Object,
    /// The bare value of the single `value` field
    BareValue,
    /// The single repeated string field, joined with commas
    CommaJoined,
    /// An ISO-8601 date-time built from `seconds` and `nanos`
    Timestamp,
}

impl Display for WireForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireForm::Object => write!(f, "object"),
            WireForm::BareValue => write!(f, "bare value"),
            WireForm::CommaJoined => write!(f, "comma-joined"),
            WireForm::Timestamp => write!(f, "timestamp"),
        }
    }
}

struct MessageDescriptor {
    id: MessageTypeId,
    name: String,
    fields: IndexMap<String, FieldDescriptor>,
    wire_form: WireForm,
}

/// An immutable message type. Cheap to clone; equality and hashing use the type's identity.
///
/// Message types live for the rest of the process once built. Types that reference themselves
/// (directly or through other types) form reference cycles and are never dropped.
#[derive(Clone)]
pub struct MessageType(Arc<MessageDescriptor>);

impl MessageType {
    pub fn builder(name: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(name)
    }

    pub fn id(&self) -> MessageTypeId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn wire_form(&self) -> WireForm {
        self.0.wire_form
    }

    /// Fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.0.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.fields.keys().map(|name| name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.0.fields.contains_key(name)
    }

    pub fn field_count(&self) -> usize {
        self.0.fields.len()
    }

    pub fn has_fields(&self) -> bool {
        !self.0.fields.is_empty()
    }

    pub fn new_message(&self) -> Message {
        Message::new(self)
    }

    pub(crate) fn references(&self) -> Vec<&MessageRef> {
        self.fields()
            .flat_map(|field| field.kind().references())
            .collect()
    }

    pub(crate) fn unresolved_references(&self) -> Vec<&MessageRef> {
        self.references()
            .into_iter()
            .filter(|message_ref| message_ref.get().is_none())
            .collect()
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Debug for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageType({})", self.name())
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub struct MessageBuilder {
    name: String,
    fields: Vec<FieldSpec>,
    wire_form: WireForm,
}

impl MessageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![],
            wire_form: WireForm::Object,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_wire_form(mut self, wire_form: WireForm) -> Self {
        self.wire_form = wire_form;
        self
    }

    /// Build the type. Every message reference must already be bound; use a
    /// [`crate::registry::MessageRegistry`] for forward and self references.
    pub fn build(self) -> Result<MessageType, ModelError> {
        let message_type = self.build_unresolved()?;

        if let Some(message_ref) = message_type.unresolved_references().first() {
            return Err(ModelError::UnresolvedReference(
                message_ref.name().to_string(),
            ));
        }

        Ok(message_type)
    }

    pub(crate) fn build_unresolved(self) -> Result<MessageType, ModelError> {
        let MessageBuilder {
            name,
            fields: field_specs,
            wire_form,
        } = self;

        let mut fields = IndexMap::new();
        for spec in field_specs {
            if fields.contains_key(spec.name()) {
                return Err(ModelError::DuplicateField {
                    message: name,
                    field: spec.name().to_string(),
                });
            }
            let field = FieldDescriptor::build(spec, &name)?;
            fields.insert(field.name().to_string(), field);
        }

        check_wire_form(&name, &fields, wire_form)?;

        tracing::debug!(message = %name, fields = fields.len(), "Built message type");

        Ok(MessageType(Arc::new(MessageDescriptor {
            id: MessageTypeId::next(),
            name,
            fields,
            wire_form,
        })))
    }
}

fn check_wire_form(
    name: &str,
    fields: &IndexMap<String, FieldDescriptor>,
    wire_form: WireForm,
) -> Result<(), ModelError> {
    let invalid = |reason: &str| ModelError::InvalidWireForm {
        message: name.to_string(),
        form: wire_form.to_string(),
        reason: reason.to_string(),
    };

    let scalar = |field_name: &str| match fields.get(field_name).map(|field| field.kind()) {
        Some(FieldKind::Scalar(scalar)) => Some(*scalar),
        _ => None,
    };

    match wire_form {
        WireForm::Object => Ok(()),
        WireForm::BareValue => {
            if fields.len() == 1 && scalar("value").is_some() {
                Ok(())
            } else {
                Err(invalid("expected exactly one scalar field named 'value'"))
            }
        }
        WireForm::CommaJoined => {
            let joinable = fields.len() == 1
                && fields.values().all(|field| {
                    matches!(
                        field.kind(),
                        FieldKind::Repeated(item)
                            if matches!(**item, FieldKind::Scalar(ScalarType::String))
                    )
                });
            if joinable {
                Ok(())
            } else {
                Err(invalid("expected exactly one repeated string field"))
            }
        }
        WireForm::Timestamp => {
            if fields.len() == 2
                && scalar("seconds") == Some(ScalarType::Int64)
                && scalar("nanos") == Some(ScalarType::Int32)
            {
                Ok(())
            } else {
                Err(invalid("expected fields 'seconds: int64' and 'nanos: int32'"))
            }
        }
    }
}

/// An instance of a message type: a sparse, declaration-ordered map from field name to value.
///
/// Absent fields read as their default. Storing `Value::Null` or a zero value removes the
/// field, so "unset" and "set to zero" are indistinguishable.
#[derive(Debug, Clone)]
pub struct Message {
    message_type: MessageType,
    values: IndexMap<String, Value>,
}

impl Message {
    pub fn new(message_type: &MessageType) -> Self {
        Self {
            message_type: message_type.clone(),
            values: IndexMap::new(),
        }
    }

    /// Assign positional values in declaration order, then named values. Null values are
    /// skipped.
    pub fn with_values<N: AsRef<str>>(
        message_type: &MessageType,
        positional: impl IntoIterator<Item = Value>,
        named: impl IntoIterator<Item = (N, Value)>,
    ) -> Result<Self, ModelError> {
        let mut message = Message::new(message_type);

        let field_names: Vec<String> = message_type.field_names().map(str::to_string).collect();
        for (index, value) in positional.into_iter().enumerate() {
            let Some(name) = field_names.get(index) else {
                return Err(ModelError::TooManyValues {
                    message: message_type.name().to_string(),
                    expected: field_names.len(),
                    actual: index + 1,
                });
            };
            message.set(name, value)?;
        }

        for (name, value) in named {
            message.set(name.as_ref(), value)?;
        }

        Ok(message)
    }

    /// Shorthand for [`Message::with_values`] with named values only.
    pub fn from_fields<N: AsRef<str>, V: Into<Value>>(
        message_type: &MessageType,
        named: impl IntoIterator<Item = (N, V)>,
    ) -> Result<Self, ModelError> {
        Self::with_values(
            message_type,
            [],
            named.into_iter().map(|(name, value)| (name, value.into())),
        )
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    fn field_descriptor(&self, name: &str) -> Result<&FieldDescriptor, ModelError> {
        self.message_type
            .field(name)
            .ok_or_else(|| ModelError::UnknownField {
                message: self.message_type.name().to_string(),
                field: name.to_string(),
            })
    }

    /// The stored value, or the field's default when absent.
    pub fn get(&self, name: &str) -> Result<Value, ModelError> {
        let field = self.field_descriptor(name)?;
        Ok(match self.values.get(name) {
            Some(value) => value.clone(),
            None => field.default_value(),
        })
    }

    /// The stored value; `None` when absent (even if the field has a default).
    pub fn get_present(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Store a value after coercing it to the field's type. Null and zero values remove the
    /// field instead.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        let value = value.into();
        let field = self.field_descriptor(name)?;

        let value = if value.is_null() {
            value
        } else {
            field.coerce(value)?
        };

        if value.is_zero() {
            self.values.shift_remove(name);
        } else {
            self.values.insert(name.to_string(), value);
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of present fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.message_type
            .fields()
            .filter_map(|field| self.values.get(field.name()).map(|value| (field, value)))
    }

    /// Copy every present value of `other` into this message.
    pub fn merge_from(&mut self, other: &Message) -> Result<(), ModelError> {
        for (field, value) in other.iter() {
            self.set(field.name(), value.clone())?;
        }
        Ok(())
    }
}

impl PartialEq for Message {
    /// Equal when the present (name, value) pairs are equal.
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.message_type.name())?;
        for (index, (field, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={value}", field.name())?;
        }
        write!(f, ")")
    }
}
