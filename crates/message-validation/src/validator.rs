// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{cmp::Ordering, convert::Infallible, sync::Arc};

use regex::Regex;

use common::{env_const::get_compile_cache_limit, error::ValidationError};
use message_model::{
    FieldDescriptor, FieldKind, Message, MessageType, NumberBound, Schema, Value,
    cache::CompiledCache,
};
use sable_env::{EnvError, Environment};

use crate::number_cmp::NumberWrapper;

#[derive(Debug)]
enum Check {
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Minimum { bound: NumberBound, exclusive: bool },
    Maximum { bound: NumberBound, exclusive: bool },
    MinItems(usize),
    MaxItems(usize),
    UniqueItems,
    MinProperties(usize),
    MaxProperties(usize),
}

impl Check {
    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        let violation = match self {
            Check::MinLength(min_length) => {
                (length(value) < *min_length).then(|| format!("{value} is too short"))
            }
            Check::MaxLength(max_length) => {
                (length(value) > *max_length).then(|| format!("{value} is too long"))
            }
            Check::Pattern(pattern) => {
                let text = match value {
                    Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                    other => other.as_str().unwrap_or_default().to_string(),
                };
                (!pattern.is_match(&text))
                    .then(|| format!("{value} does not match '{}'", pattern.as_str()))
            }
            Check::Minimum { bound, exclusive } => {
                let ordering = compare(value, bound);
                if *exclusive && ordering != Some(Ordering::Greater) {
                    Some(format!(
                        "{value} is less than or equal to the minimum of {bound}"
                    ))
                } else if ordering.is_none_or(|ordering| ordering == Ordering::Less) {
                    Some(format!("{value} is less than the minimum of {bound}"))
                } else {
                    None
                }
            }
            Check::Maximum { bound, exclusive } => {
                let ordering = compare(value, bound);
                if *exclusive && ordering != Some(Ordering::Less) {
                    Some(format!(
                        "{value} is greater than or equal to the maximum of {bound}"
                    ))
                } else if ordering.is_none_or(|ordering| ordering == Ordering::Greater) {
                    Some(format!("{value} is greater than the maximum of {bound}"))
                } else {
                    None
                }
            }
            Check::MinItems(min_items) => {
                (length(value) < *min_items).then(|| format!("{value} is too short"))
            }
            Check::MaxItems(max_items) => {
                (length(value) > *max_items).then(|| format!("{value} is too long"))
            }
            Check::UniqueItems => {
                let items = value.as_list().unwrap_or_default();
                let duplicated = items
                    .iter()
                    .enumerate()
                    .any(|(index, item)| items[..index].contains(item));
                duplicated.then(|| format!("{value} has non-unique elements"))
            }
            Check::MinProperties(min_properties) => (length(value) < *min_properties)
                .then(|| format!("{value} does not have enough properties")),
            Check::MaxProperties(max_properties) => (length(value) > *max_properties)
                .then(|| format!("{value} has too many properties")),
        };

        match violation {
            Some(description) => Err(ValidationError::constraint(description)),
            None => Ok(()),
        }
    }
}

/// Characters for strings, bytes for bytes, entries for containers.
fn length(value: &Value) -> usize {
    match value {
        Value::String(value) => value.chars().count(),
        Value::Bytes(value) => value.len(),
        Value::List(values) => values.len(),
        Value::Map(values) => values.len(),
        _ => 0,
    }
}

fn compare(value: &Value, bound: &NumberBound) -> Option<Ordering> {
    NumberWrapper::from_value(value)
        .and_then(|number| number.partial_cmp(&NumberWrapper::from(bound)))
}

fn value_checks(schema: &Schema, pattern: Option<&Regex>) -> Vec<Check> {
    let mut checks = vec![];

    if let Some(min_length) = schema.min_length {
        checks.push(Check::MinLength(min_length));
    }
    if let Some(max_length) = schema.max_length {
        checks.push(Check::MaxLength(max_length));
    }
    if let Some(pattern) = pattern {
        checks.push(Check::Pattern(pattern.clone()));
    }
    if let Some(minimum) = schema.minimum {
        checks.push(Check::Minimum {
            bound: minimum,
            exclusive: schema.exclusive_minimum,
        });
    }
    if let Some(maximum) = schema.maximum {
        checks.push(Check::Maximum {
            bound: maximum,
            exclusive: schema.exclusive_maximum,
        });
    }

    checks
}

fn container_checks(schema: &Schema) -> Vec<Check> {
    let mut checks = vec![];

    if let Some(min_items) = schema.min_items {
        checks.push(Check::MinItems(min_items));
    }
    if let Some(max_items) = schema.max_items {
        checks.push(Check::MaxItems(max_items));
    }
    if schema.unique_items {
        checks.push(Check::UniqueItems);
    }
    if let Some(min_properties) = schema.min_properties {
        checks.push(Check::MinProperties(min_properties));
    }
    if let Some(max_properties) = schema.max_properties {
        checks.push(Check::MaxProperties(max_properties));
    }

    checks
}

#[derive(Debug)]
enum FieldValidator {
    Value(Vec<Check>),
    /// Nested messages are validated with their own type's validator
    Message,
    Repeated {
        container: Vec<Check>,
        items: Option<Box<FieldValidator>>,
    },
    Map {
        container: Vec<Check>,
        values: Option<Box<FieldValidator>>,
    },
}

impl FieldValidator {
    /// `None` when the field has nothing to check.
    fn compile(field: &FieldDescriptor) -> Option<Self> {
        let schema = field.schema();

        let item_validator = || match field.kind().item_kind() {
            FieldKind::Message(_) => Some(FieldValidator::Message),
            _ => {
                let checks = value_checks(schema, field.pattern());
                (!checks.is_empty()).then_some(FieldValidator::Value(checks))
            }
        };

        match field.kind() {
            FieldKind::Repeated(_) | FieldKind::Map(_) => {
                let container = container_checks(schema);
                let items = item_validator().map(Box::new);
                if container.is_empty() && items.is_none() {
                    return None;
                }

                Some(if matches!(field.kind(), FieldKind::Repeated(_)) {
                    FieldValidator::Repeated { container, items }
                } else {
                    FieldValidator::Map {
                        container,
                        values: items,
                    }
                })
            }
            _ => item_validator(),
        }
    }
}

#[derive(Debug)]
struct CompiledValidator {
    fields: Vec<(String, FieldValidator)>,
}

impl CompiledValidator {
    fn compile(message_type: &MessageType) -> Self {
        let fields: Vec<_> = message_type
            .fields()
            .filter_map(|field| {
                FieldValidator::compile(field).map(|validator| (field.name().to_string(), validator))
            })
            .collect();

        tracing::debug!(
            message = message_type.name(),
            fields = fields.len(),
            "Compiled validator"
        );

        Self { fields }
    }
}

/// Checks messages against the schemas of their fields.
///
/// Only present values are checked. Validation stops at the first violation, whose path names
/// the field (by name, not JSON name), then item indices and map keys.
pub struct MessageValidator {
    compiled: CompiledCache<CompiledValidator>,
}

impl MessageValidator {
    pub fn new() -> Self {
        Self::with_cache_limit(None)
    }

    pub fn with_cache_limit(limit: Option<usize>) -> Self {
        Self {
            compiled: CompiledCache::with_limit(limit),
        }
    }

    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        Ok(Self::with_cache_limit(get_compile_cache_limit(env)?))
    }

    fn compiled(&self, message_type: &MessageType) -> Arc<CompiledValidator> {
        let Ok(compiled) = self.compiled.get_or_compile(message_type, |message_type| {
            Ok::<_, Infallible>(CompiledValidator::compile(message_type))
        });
        compiled
    }

    pub fn validate(&self, message: &Message) -> Result<(), ValidationError> {
        let compiled = self.compiled(message.message_type());

        for (name, validator) in &compiled.fields {
            if let Some(value) = message.get_present(name) {
                self.validate_value(validator, value)
                    .map_err(|error| error.with_field(name))?;
            }
        }

        Ok(())
    }

    fn validate_value(
        &self,
        validator: &FieldValidator,
        value: &Value,
    ) -> Result<(), ValidationError> {
        match validator {
            FieldValidator::Value(checks) => checks.iter().try_for_each(|check| check.check(value)),
            FieldValidator::Message => match value.as_message() {
                Some(message) => self.validate(message),
                None => Ok(()),
            },
            FieldValidator::Repeated { container, items } => {
                container.iter().try_for_each(|check| check.check(value))?;

                if let Some(items) = items {
                    for (index, item) in value.as_list().unwrap_or_default().iter().enumerate() {
                        self.validate_value(items, item)
                            .map_err(|error| error.with_index(index))?;
                    }
                }
                Ok(())
            }
            FieldValidator::Map { container, values } => {
                container.iter().try_for_each(|check| check.check(value))?;

                if let (Some(values), Some(map)) = (values, value.as_map()) {
                    for (key, map_value) in map {
                        self.validate_value(values, map_value)
                            .map_err(|error| error.with_field(key))?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::ValidationErrorKind;
    use message_model::{FieldSpec, ScalarType, registry::MessageRegistry};

    fn name_type() -> MessageType {
        MessageType::builder("Named")
            .field(
                FieldSpec::string("name")
                    .with_schema(Schema::new().with_min_length(3).with_max_length(5)),
            )
            .build()
            .unwrap()
    }

    fn named(name: &str) -> Message {
        Message::from_fields(&name_type(), [("name", name)]).unwrap()
    }

    #[test]
    fn length_boundaries() {
        let validator = MessageValidator::new();

        for name in ["abc", "abcd", "abcde", "äöü"] {
            validator.validate(&named(name)).unwrap();
        }

        let error = validator.validate(&named("ab")).unwrap_err();
        assert_eq!(error.description, "'ab' is too short");
        assert_eq!(error.path.to_string(), "name");
        assert_eq!(error.kind, ValidationErrorKind::ConstraintViolation);

        let error = validator.validate(&named("abcdef")).unwrap_err();
        assert_eq!(error.description, "'abcdef' is too long");
    }

    #[test]
    fn absent_values_are_not_checked() {
        let message = Message::new(&name_type());
        MessageValidator::new().validate(&message).unwrap();
    }

    #[test]
    fn repeated_items() {
        let message_type = MessageType::builder("Tagged")
            .field(
                FieldSpec::repeated("tags", FieldKind::Scalar(ScalarType::String)).with_schema(
                    Schema::new()
                        .with_min_length(3)
                        .with_max_length(5)
                        .with_max_items(5),
                ),
            )
            .build()
            .unwrap();
        let validator = MessageValidator::new();

        let tagged = |tags: Vec<&str>| Message::from_fields(&message_type, [("tags", tags)]).unwrap();

        validator.validate(&tagged(vec!["abc", "abcde"])).unwrap();

        let error = validator
            .validate(&tagged(vec!["abc", "ab", "abcdef"]))
            .unwrap_err();
        assert_eq!(error.path.to_string(), "tags.1");
        assert_eq!(error.description, "'ab' is too short");

        let error = validator
            .validate(&tagged(vec!["abc"; 6]))
            .unwrap_err();
        assert_eq!(error.path.to_string(), "tags");
        assert!(error.description.ends_with("is too long"));
    }

    #[test]
    fn numeric_bounds() {
        let message_type = MessageType::builder("Sized")
            .field(
                FieldSpec::int32("size")
                    .with_schema(Schema::new().with_minimum(1).with_maximum(10)),
            )
            .field(FieldSpec::float64("ratio").with_schema(
                Schema::new()
                    .with_exclusive_minimum(0)
                    .with_exclusive_maximum(1),
            ))
            .build()
            .unwrap();
        let validator = MessageValidator::new();

        let check = |name: &str, value: Value| {
            validator.validate(&Message::from_fields(&message_type, [(name, value)]).unwrap())
        };

        check("size", Value::Int(1)).unwrap();
        check("size", Value::Int(10)).unwrap();
        assert_eq!(
            check("size", Value::Int(-1)).unwrap_err().description,
            "-1 is less than the minimum of 1"
        );
        assert_eq!(
            check("size", Value::Int(11)).unwrap_err().description,
            "11 is greater than the maximum of 10"
        );

        check("ratio", Value::Float(0.5)).unwrap();
        assert_eq!(
            check("ratio", Value::Float(1.0)).unwrap_err().description,
            "1.0 is greater than or equal to the maximum of 1"
        );
        assert_eq!(
            check("ratio", Value::Float(-0.5)).unwrap_err().description,
            "-0.5 is less than or equal to the minimum of 0"
        );
    }

    #[test]
    fn patterns_search_anywhere() {
        let message_type = MessageType::builder("Coded")
            .field(FieldSpec::string("code").with_schema(Schema::new().with_pattern("[0-9]+")))
            .build()
            .unwrap();
        let validator = MessageValidator::new();

        validator
            .validate(&Message::from_fields(&message_type, [("code", "abc123def")]).unwrap())
            .unwrap();

        let error = validator
            .validate(&Message::from_fields(&message_type, [("code", "abc")]).unwrap())
            .unwrap_err();
        assert_eq!(error.description, "'abc' does not match '[0-9]+'");
    }

    #[test]
    fn container_constraints() {
        let message_type = MessageType::builder("Containers")
            .field(
                FieldSpec::repeated("ids", FieldKind::Scalar(ScalarType::Int64))
                    .with_schema(Schema::new().with_unique_items()),
            )
            .field(
                FieldSpec::map("labels", FieldKind::Scalar(ScalarType::String)).with_schema(
                    Schema::new()
                        .with_max_properties(1)
                        .with_min_length(2),
                ),
            )
            .build()
            .unwrap();
        let validator = MessageValidator::new();

        let error = validator
            .validate(&Message::from_fields(&message_type, [("ids", vec![1i64, 2, 1])]).unwrap())
            .unwrap_err();
        assert_eq!(error.description, "[1, 2, 1] has non-unique elements");

        let labels = |pairs: Vec<(&str, &str)>| {
            Value::Map(
                pairs
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), Value::from(value)))
                    .collect(),
            )
        };

        let error = validator
            .validate(
                &Message::from_fields(&message_type, [("labels", labels(vec![("a", "xx"), ("b", "yy")]))])
                    .unwrap(),
            )
            .unwrap_err();
        assert!(error.description.ends_with("has too many properties"));

        let error = validator
            .validate(
                &Message::from_fields(&message_type, [("labels", labels(vec![("a", "x")]))]).unwrap(),
            )
            .unwrap_err();
        assert_eq!(error.path.to_string(), "labels.a");
    }

    #[test]
    fn nested_and_recursive_messages() {
        let mut registry = MessageRegistry::new();
        registry
            .declare(
                MessageType::builder("Node")
                    .field(FieldSpec::string("label").with_schema(Schema::new().with_min_length(1)))
                    .field(FieldSpec::repeated(
                        "children",
                        FieldKind::message_named("Node"),
                    )),
            )
            .unwrap();
        registry.resolve().unwrap();
        let node_type = registry.get("Node").unwrap().clone();

        let node = |label: &str, children: Vec<Message>| {
            Message::from_fields(
                &node_type,
                [
                    ("label", Value::from(label)),
                    (
                        "children",
                        Value::List(children.into_iter().map(Value::Message).collect()),
                    ),
                ],
            )
            .unwrap()
        };

        let validator = MessageValidator::new();
        let tree = node("root", vec![node("a", vec![]), node("b", vec![node("c", vec![])])]);
        validator.validate(&tree).unwrap();

        let child_type = name_type();
        let parent_type = MessageType::builder("Parent")
            .field(FieldSpec::message("child", &child_type))
            .build()
            .unwrap();
        let child = Message::from_fields(&child_type, [("name", "x")]).unwrap();
        let parent = Message::from_fields(&parent_type, [("child", child)]).unwrap();

        let error = validator.validate(&parent).unwrap_err();
        assert_eq!(error.path.to_string(), "child.name");
    }
}
