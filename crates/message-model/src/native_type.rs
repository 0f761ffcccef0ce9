// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use crate::{message::MessageType, value::Value};

/// The type of a value as seen by handler code (as opposed to its wire representation).
#[derive(Debug, Clone, PartialEq)]
pub enum NativeType {
    /// Unannotated; compatible with everything
    Any,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    Date,
    DateTime,
    Message(MessageType),
    List(Box<NativeType>),
    Map(Box<NativeType>),
    /// A type the framework knows only by name (for example a value injected by a resolver)
    Named(String),
}

impl NativeType {
    pub fn list(item: NativeType) -> Self {
        NativeType::List(Box::new(item))
    }

    pub fn map(value: NativeType) -> Self {
        NativeType::Map(Box::new(value))
    }

    pub fn named(name: impl Into<String>) -> Self {
        NativeType::Named(name.into())
    }

    fn is_integer(&self) -> bool {
        matches!(self, NativeType::Int32 | NativeType::Int64)
    }

    fn is_float(&self) -> bool {
        matches!(self, NativeType::Float32 | NativeType::Float64)
    }

    /// Binding-level compatibility: `Any` matches everything, integer kinds match each other,
    /// and so do float kinds.
    pub fn is_compatible(&self, other: &NativeType) -> bool {
        match (self, other) {
            (NativeType::Any, _) | (_, NativeType::Any) => true,
            (left, right) if left.is_integer() && right.is_integer() => true,
            (left, right) if left.is_float() && right.is_float() => true,
            (NativeType::List(left), NativeType::List(right))
            | (NativeType::Map(left), NativeType::Map(right)) => left.is_compatible(right),
            (left, right) => left == right,
        }
    }

    /// Coerce a value to this type. Integral floats become integers, integers become floats, and
    /// `Int32` is range-checked. The original value is handed back on failure.
    pub fn coerce(&self, value: Value) -> Result<Value, Value> {
        match (self, value) {
            (NativeType::Any, value) => Ok(value),
            (NativeType::Bool, value @ Value::Bool(_)) => Ok(value),
            (NativeType::Int32, Value::Int(value)) => i32::try_from(value)
                .map(|_| Value::Int(value))
                .map_err(|_| Value::Int(value)),
            (NativeType::Int32, Value::Float(value)) => {
                if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
                    Ok(Value::Int(value as i64))
                } else {
                    Err(Value::Float(value))
                }
            }
            (NativeType::Int64, value @ Value::Int(_)) => Ok(value),
            (NativeType::Int64, Value::Float(value)) => {
                // i64::MAX is not exactly representable; the bound is exclusive
                if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
                    Ok(Value::Int(value as i64))
                } else {
                    Err(Value::Float(value))
                }
            }
            (NativeType::Float32 | NativeType::Float64, value @ Value::Float(_)) => Ok(value),
            (NativeType::Float32 | NativeType::Float64, Value::Int(value)) => {
                Ok(Value::Float(value as f64))
            }
            (NativeType::String, value @ Value::String(_)) => Ok(value),
            (NativeType::Bytes, value @ Value::Bytes(_)) => Ok(value),
            (NativeType::Date, value @ Value::Date(_)) => Ok(value),
            (NativeType::DateTime, value @ Value::DateTime(_)) => Ok(value),
            (NativeType::Message(message_type), Value::Message(message)) => {
                if message.message_type() == message_type {
                    Ok(Value::Message(message))
                } else {
                    Err(Value::Message(message))
                }
            }
            (NativeType::List(item_type), Value::List(values)) => {
                let mut coerced = Vec::with_capacity(values.len());
                let mut values = values.into_iter();
                while let Some(value) = values.next() {
                    match item_type.coerce(value) {
                        Ok(value) => coerced.push(value),
                        Err(value) => {
                            coerced.push(value);
                            coerced.extend(values);
                            return Err(Value::List(coerced));
                        }
                    }
                }
                Ok(Value::List(coerced))
            }
            (NativeType::Map(value_type), Value::Map(values)) => {
                if values.values().all(|value| value_type.accepts(value)) {
                    Ok(Value::Map(
                        values
                            .into_iter()
                            .map(|(key, value)| (key, value_type.coerce(value).unwrap_or_else(|v| v)))
                            .collect(),
                    ))
                } else {
                    Err(Value::Map(values))
                }
            }
            (_, value) => Err(value),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.coerce(value.clone()).is_ok()
    }
}

impl Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeType::Any => write!(f, "any"),
            NativeType::Bool => write!(f, "bool"),
            NativeType::Int32 => write!(f, "int32"),
            NativeType::Int64 => write!(f, "int64"),
            NativeType::Float32 => write!(f, "float32"),
            NativeType::Float64 => write!(f, "float64"),
            NativeType::String => write!(f, "string"),
            NativeType::Bytes => write!(f, "bytes"),
            NativeType::Date => write!(f, "date"),
            NativeType::DateTime => write!(f, "date-time"),
            NativeType::Message(message_type) => write!(f, "{}", message_type.name()),
            NativeType::List(item) => write!(f, "list<{item}>"),
            NativeType::Map(value) => write!(f, "map<string, {value}>"),
            NativeType::Named(name) => write!(f, "{name}"),
        }
    }
}
