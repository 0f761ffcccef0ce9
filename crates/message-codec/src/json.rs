// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use common::{
    env_const::get_compile_cache_limit,
    error::{ValidationError, ValidationErrorKind},
};
use message_model::{
    Converter, FieldDescriptor, FieldKind, Message, MessageType, ModelError, ScalarType, Value,
    WireForm, cache::CompiledCache, converters::timestamp_to_date_time,
};
use sable_env::{EnvError, Environment};

use crate::{error::EncodeError, protocol::Protocol};

/// How a single field value maps to JSON.
#[derive(Debug)]
pub(crate) enum FieldCoder {
    Bool,
    Integer { int32: bool },
    Float,
    String,
    /// Base64 (standard alphabet, padded)
    Bytes,
    Message(MessageType),
    Repeated(Box<FieldCoder>),
    Map(Box<FieldCoder>),
    Converter(Arc<dyn Converter>),
}

impl FieldCoder {
    fn compile(kind: &FieldKind) -> Result<Self, ModelError> {
        Ok(match kind {
            FieldKind::Scalar(scalar) => match scalar {
                ScalarType::Bool => FieldCoder::Bool,
                ScalarType::Int32 => FieldCoder::Integer { int32: true },
                ScalarType::Int64 => FieldCoder::Integer { int32: false },
                ScalarType::Float32 | ScalarType::Float64 => FieldCoder::Float,
                ScalarType::String => FieldCoder::String,
                ScalarType::Bytes => FieldCoder::Bytes,
            },
            FieldKind::Message(message_ref) => {
                FieldCoder::Message(message_ref.message_type()?.clone())
            }
            FieldKind::Repeated(item) => FieldCoder::Repeated(Box::new(Self::compile(item)?)),
            FieldKind::Map(value) => FieldCoder::Map(Box::new(Self::compile(value)?)),
            FieldKind::Converter(converter) => FieldCoder::Converter(converter.clone()),
        })
    }

    /// The JSON type name used in type mismatch errors.
    fn expected_type(&self) -> &'static str {
        match self {
            FieldCoder::Bool => "boolean",
            FieldCoder::Integer { .. } => "integer",
            FieldCoder::Float => "number",
            FieldCoder::String | FieldCoder::Bytes => "string",
            FieldCoder::Message(_) | FieldCoder::Map(_) | FieldCoder::Converter(_) => "object",
            FieldCoder::Repeated(_) => "array",
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompiledField {
    pub name: String,
    pub json_name: String,
    pub coder: FieldCoder,
}

impl CompiledField {
    fn compile(field: &FieldDescriptor) -> Result<Self, ModelError> {
        Ok(Self {
            name: field.name().to_string(),
            json_name: field.json_name().to_string(),
            coder: FieldCoder::compile(field.kind())?,
        })
    }
}

#[derive(Debug)]
pub(crate) enum Layout {
    Object(Vec<CompiledField>),
    BareValue(CompiledField),
    CommaJoined(CompiledField),
    Timestamp,
}

#[derive(Debug)]
pub(crate) struct CompiledMessage {
    layout: Layout,
}

impl CompiledMessage {
    fn compile(message_type: &MessageType) -> Result<Self, ModelError> {
        let mut fields = message_type
            .fields()
            .map(CompiledField::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let missing_field = || ModelError::InvalidWireForm {
            message: message_type.name().to_string(),
            form: message_type.wire_form().to_string(),
            reason: "expected exactly one field".to_string(),
        };

        let layout = match message_type.wire_form() {
            WireForm::Object => Layout::Object(fields),
            WireForm::BareValue => Layout::BareValue(fields.pop().ok_or_else(missing_field)?),
            WireForm::CommaJoined => Layout::CommaJoined(fields.pop().ok_or_else(missing_field)?),
            WireForm::Timestamp => Layout::Timestamp,
        };

        tracing::debug!(message = message_type.name(), "Compiled JSON codec");

        Ok(Self { layout })
    }

    /// Fields addressable by name in this layout.
    pub(crate) fn fields(&self) -> &[CompiledField] {
        match &self.layout {
            Layout::Object(fields) => fields,
            Layout::BareValue(field) | Layout::CommaJoined(field) => std::slice::from_ref(field),
            Layout::Timestamp => &[],
        }
    }
}

/// Render a JSON value the way error messages show it: strings in single quotes, everything else
/// as JSON text.
pub(crate) fn display_json(value: &JsonValue) -> String {
    match value {
        JsonValue::String(value) => format!("'{value}'"),
        other => other.to_string(),
    }
}

fn mismatch(value: &JsonValue, expected: &str) -> ValidationError {
    ValidationError::type_mismatch(display_json(value), expected)
}

pub(crate) fn model_error(error: ModelError) -> ValidationError {
    ValidationError::new(ValidationErrorKind::TypeMismatch, error.to_string())
}

fn in_subset(subset: Option<&[String]>, name: &str) -> bool {
    subset.is_none_or(|names| names.iter().any(|subset_name| subset_name == name))
}

/// JSON codec. Objects carry one key per present field (by JSON name); well-known types use
/// their wire form instead.
pub struct JsonProtocol {
    compiled: CompiledCache<CompiledMessage>,
}

impl JsonProtocol {
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

    pub(crate) fn compiled(
        &self,
        message_type: &MessageType,
    ) -> Result<Arc<CompiledMessage>, ModelError> {
        self.compiled
            .get_or_compile(message_type, CompiledMessage::compile)
    }

    pub fn encode(&self, message: &Message) -> Result<JsonValue, EncodeError> {
        self.encode_message(message, None)
    }

    /// Encode only the named fields (ignored for non-object wire forms).
    pub fn encode_fields(
        &self,
        message: &Message,
        fields: &[String],
    ) -> Result<JsonValue, EncodeError> {
        self.encode_message(message, Some(fields))
    }

    pub fn decode(
        &self,
        message_type: &MessageType,
        value: &JsonValue,
    ) -> Result<Message, ValidationError> {
        let mut message = Message::new(message_type);
        self.decode_message_into(&mut message, value, None)?;
        Ok(message)
    }

    /// Decode into an existing message, overwriting the fields present in `value`.
    pub fn decode_into(
        &self,
        message: &mut Message,
        value: &JsonValue,
    ) -> Result<(), ValidationError> {
        self.decode_message_into(message, value, None)
    }

    /// Like [`JsonProtocol::decode_into`], reading only the named fields.
    pub fn decode_fields_into(
        &self,
        message: &mut Message,
        value: &JsonValue,
        fields: &[String],
    ) -> Result<(), ValidationError> {
        self.decode_message_into(message, value, Some(fields))
    }

    pub fn pack_fields(&self, message: &Message, fields: &[String]) -> Result<Vec<u8>, EncodeError> {
        let value = self.encode_fields(message, fields)?;
        to_bytes(&value)
    }

    pub fn unpack_fields_into(
        &self,
        message: &mut Message,
        bytes: &[u8],
        fields: &[String],
    ) -> Result<(), ValidationError> {
        let value = parse(bytes)?;
        self.decode_fields_into(message, &value, fields)
    }

    fn encode_message(
        &self,
        message: &Message,
        subset: Option<&[String]>,
    ) -> Result<JsonValue, EncodeError> {
        let compiled = self.compiled(message.message_type())?;

        match &compiled.layout {
            Layout::Object(fields) => {
                let mut object = serde_json::Map::new();
                for field in fields.iter().filter(|field| in_subset(subset, &field.name)) {
                    if let Some(value) = message.get_present(&field.name) {
                        let encoded = self
                            .encode_value(&field.coder, value)
                            .map_err(|error| error.with_field(&field.json_name))?;
                        object.insert(field.json_name.clone(), encoded);
                    }
                }
                Ok(JsonValue::Object(object))
            }
            Layout::BareValue(field) => {
                let value = message.get(&field.name)?;
                self.encode_value(&field.coder, &value)
            }
            Layout::CommaJoined(field) => {
                let paths = message.get(&field.name)?;
                let joined = paths
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(JsonValue::String(joined))
            }
            Layout::Timestamp => {
                let date_time = timestamp_to_date_time(message)?;
                Ok(JsonValue::String(
                    date_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                ))
            }
        }
    }

    pub(crate) fn encode_value(
        &self,
        coder: &FieldCoder,
        value: &Value,
    ) -> Result<JsonValue, EncodeError> {
        let expected = coder.expected_type();
        let mismatch = || EncodeError::type_mismatch(value, expected);

        match coder {
            FieldCoder::Bool => value.as_bool().map(JsonValue::Bool).ok_or_else(mismatch),
            FieldCoder::Integer { .. } => value.as_i64().map(JsonValue::from).ok_or_else(mismatch),
            FieldCoder::Float => value
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .ok_or_else(mismatch),
            FieldCoder::String => value
                .as_str()
                .map(|value| JsonValue::String(value.to_string()))
                .ok_or_else(mismatch),
            FieldCoder::Bytes => value
                .as_bytes()
                .map(|bytes| JsonValue::String(STANDARD.encode(bytes)))
                .ok_or_else(mismatch),
            FieldCoder::Message(_) => self.encode(value.as_message().ok_or_else(mismatch)?),
            FieldCoder::Repeated(item) => value
                .as_list()
                .ok_or_else(mismatch)?
                .iter()
                .enumerate()
                .map(|(index, item_value)| {
                    self.encode_value(item, item_value)
                        .map_err(|error| error.with_index(index))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            FieldCoder::Map(value_coder) => value
                .as_map()
                .ok_or_else(mismatch)?
                .iter()
                .map(|(key, map_value)| {
                    let encoded = self
                        .encode_value(value_coder, map_value)
                        .map_err(|error| error.with_field(key))?;
                    Ok((key.clone(), encoded))
                })
                .collect::<Result<serde_json::Map<_, _>, EncodeError>>()
                .map(JsonValue::Object),
            FieldCoder::Converter(converter) => {
                let wire = converter.format(value)?;
                self.encode(&wire)
            }
        }
    }

    fn decode_message_into(
        &self,
        message: &mut Message,
        value: &JsonValue,
        subset: Option<&[String]>,
    ) -> Result<(), ValidationError> {
        let compiled = self.compiled(message.message_type()).map_err(model_error)?;

        match &compiled.layout {
            Layout::Object(fields) => {
                let object = value.as_object().ok_or_else(|| mismatch(value, "object"))?;

                for field in fields.iter().filter(|field| in_subset(subset, &field.name)) {
                    // Unknown keys are ignored
                    let Some(field_value) = object.get(&field.json_name) else {
                        continue;
                    };

                    self.decode_value(&field.coder, field_value)
                        .and_then(|decoded| message.set(&field.name, decoded).map_err(model_error))
                        .map_err(|error| error.with_field(&field.json_name))?;
                }
                Ok(())
            }
            Layout::BareValue(field) => {
                let decoded = self.decode_value(&field.coder, value)?;
                message.set(&field.name, decoded).map_err(model_error)
            }
            Layout::CommaJoined(field) => {
                let joined = value.as_str().ok_or_else(|| mismatch(value, "string"))?;
                let paths: Vec<Value> = if joined.is_empty() {
                    vec![]
                } else {
                    joined.split(',').map(Value::from).collect()
                };
                message.set(&field.name, paths).map_err(model_error)
            }
            Layout::Timestamp => {
                let text = value.as_str().ok_or_else(|| mismatch(value, "string"))?;
                let date_time = parse_date_time(text).ok_or_else(|| {
                    ValidationError::new(
                        ValidationErrorKind::TypeMismatch,
                        format!("'{text}' is not a 'date' or 'date-time'"),
                    )
                })?;
                message
                    .set("seconds", date_time.timestamp())
                    .and_then(|_| message.set("nanos", date_time.timestamp_subsec_nanos()))
                    .map_err(model_error)
            }
        }
    }

    pub(crate) fn decode_value(
        &self,
        coder: &FieldCoder,
        value: &JsonValue,
    ) -> Result<Value, ValidationError> {
        let expected = coder.expected_type();

        match coder {
            FieldCoder::Bool => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| mismatch(value, expected)),
            FieldCoder::Integer { int32 } => decode_integer(value, *int32),
            FieldCoder::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch(value, expected)),
            FieldCoder::String => value
                .as_str()
                .map(Value::from)
                .ok_or_else(|| mismatch(value, expected)),
            FieldCoder::Bytes => {
                let encoded = value.as_str().ok_or_else(|| mismatch(value, expected))?;
                STANDARD
                    .decode(encoded)
                    .map(|bytes| Value::Bytes(bytes.into()))
                    .map_err(|_| {
                        ValidationError::new(
                            ValidationErrorKind::TypeMismatch,
                            format!("'{encoded}' is not valid base64"),
                        )
                    })
            }
            FieldCoder::Message(message_type) => {
                self.decode(message_type, value).map(Value::Message)
            }
            FieldCoder::Repeated(item) => value
                .as_array()
                .ok_or_else(|| mismatch(value, expected))?
                .iter()
                .enumerate()
                .map(|(index, item_value)| {
                    self.decode_value(item, item_value)
                        .map_err(|error| error.with_index(index))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            FieldCoder::Map(value_coder) => value
                .as_object()
                .ok_or_else(|| mismatch(value, expected))?
                .iter()
                .map(|(key, map_value)| {
                    let decoded = self
                        .decode_value(value_coder, map_value)
                        .map_err(|error| error.with_field(key))?;
                    Ok((key.clone(), decoded))
                })
                .collect::<Result<IndexMap<_, _>, ValidationError>>()
                .map(Value::Map),
            FieldCoder::Converter(converter) => {
                let wire = self.decode(converter.wire(), value)?;
                converter.resolve(&wire).map_err(model_error)
            }
        }
    }
}

impl Default for JsonProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for JsonProtocol {
    fn name(&self) -> &'static str {
        "json"
    }

    fn mime_type(&self) -> &'static str {
        "application/json"
    }

    fn pack(&self, message: &Message) -> Result<Vec<u8>, EncodeError> {
        if !message.message_type().has_fields() {
            return Ok(vec![]);
        }
        to_bytes(&self.encode(message)?)
    }

    fn unpack(&self, message_type: &MessageType, bytes: &[u8]) -> Result<Message, ValidationError> {
        if bytes.is_empty() && !message_type.has_fields() {
            return Ok(Message::new(message_type));
        }
        let value = parse(bytes)?;
        self.decode(message_type, &value)
    }
}

fn to_bytes(value: &JsonValue) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(value).map_err(|error| EncodeError::new(error.to_string()))
}

fn parse(bytes: &[u8]) -> Result<JsonValue, ValidationError> {
    serde_json::from_slice(bytes).map_err(ValidationError::invalid_payload)
}

/// Integers may arrive as integral floats (`3.0`). Anything fractional or out of range is a type
/// error.
fn decode_integer(value: &JsonValue, int32: bool) -> Result<Value, ValidationError> {
    let JsonValue::Number(number) = value else {
        return Err(mismatch(value, "integer"));
    };

    let integer = number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|float| {
                float.fract() == 0.0 && *float >= i64::MIN as f64 && *float < i64::MAX as f64
            })
            .map(|float| float as i64)
    });

    match integer {
        Some(integer) if int32 && i32::try_from(integer).is_err() => Err(ValidationError::new(
            ValidationErrorKind::TypeMismatch,
            format!("{integer} is out of range for 'int32'"),
        )),
        Some(integer) => Ok(Value::Int(integer)),
        None => Err(mismatch(value, "integer")),
    }
}

/// RFC 3339 date-times, date-times without an offset (taken as UTC), or plain dates (UTC
/// midnight).
fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.with_timezone(&Utc));
    }
    if let Ok(date_time) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(date_time.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date_time| date_time.and_utc())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use common::path::{FieldPath, PathSegment};
    use message_model::{FieldSpec, well_known};

    fn pet() -> MessageType {
        MessageType::builder("Pet")
            .field(FieldSpec::int64("pet_id"))
            .field(FieldSpec::string("name"))
            .field(FieldSpec::repeated(
                "sounds",
                FieldKind::Scalar(ScalarType::String),
            ))
            .field(FieldSpec::map("tags", FieldKind::Scalar(ScalarType::Int32)))
            .field(FieldSpec::bytes("photo"))
            .field(FieldSpec::float64("weight"))
            .field(FieldSpec::bool("adopted"))
            .field(FieldSpec::date_time("born"))
            .build()
            .unwrap()
    }

    fn path(segments: &[&str]) -> FieldPath {
        segments
            .iter()
            .map(|segment| PathSegment::from(*segment))
            .collect()
    }

    #[test]
    fn round_trip_all_field_kinds() {
        let protocol = JsonProtocol::new();
        let pet = pet();

        let value = json!({
            "petId": 42,
            "name": "Tom",
            "sounds": ["meow", "purr"],
            "tags": {"age": 3},
            "photo": "aGVsbG8=",
            "weight": 4.5,
            "adopted": true,
            "born": "2020-02-29T12:30:00.500Z",
        });

        let message = protocol.decode(&pet, &value).unwrap();
        assert_eq!(message.get("pet_id").unwrap(), Value::Int(42));
        assert_eq!(
            message.get("photo").unwrap(),
            Value::Bytes(b"hello".to_vec().into())
        );

        assert_eq!(protocol.encode(&message).unwrap(), value);

        let packed = protocol.pack(&message).unwrap();
        assert_eq!(protocol.unpack(&pet, &packed).unwrap(), message);
    }

    #[test]
    fn json_names_are_camel_case_unless_overridden() {
        let message_type = MessageType::builder("Renamed")
            .field(FieldSpec::int64("pet_id"))
            .field(FieldSpec::string("owner_name").with_json_name("owner"))
            .build()
            .unwrap();
        let message = Message::from_fields(
            &message_type,
            [("pet_id", Value::Int(1)), ("owner_name", Value::from("ann"))],
        )
        .unwrap();

        assert_eq!(
            JsonProtocol::new().encode(&message).unwrap(),
            json!({"petId": 1, "owner": "ann"})
        );
    }

    #[test]
    fn empty_messages() {
        let protocol = JsonProtocol::new();

        let message = Message::new(&pet());
        assert_eq!(protocol.encode(&message).unwrap(), json!({}));

        let empty = well_known::empty();
        assert!(protocol.pack(&Message::new(&empty)).unwrap().is_empty());
        assert_eq!(
            protocol.unpack(&empty, b"").unwrap(),
            Message::new(&empty)
        );
        assert_eq!(
            protocol.unpack(&empty, b"{}").unwrap(),
            Message::new(&empty)
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let message = JsonProtocol::new()
            .decode(&pet(), &json!({"name": "Tom", "color": "grey"}))
            .unwrap();
        assert_eq!(message.len(), 1);
    }

    #[test]
    fn type_errors_carry_the_path() {
        let protocol = JsonProtocol::new();

        let error = protocol
            .decode(&pet(), &json!({"sounds": "meow, purr"}))
            .unwrap_err();
        assert_eq!(error.path, path(&["sounds"]));
        assert_eq!(error.description, "'meow, purr' is not of type 'array'");
        assert_eq!(error.kind, ValidationErrorKind::TypeMismatch);

        let error = protocol
            .decode(&pet(), &json!({"sounds": ["meow", 3]}))
            .unwrap_err();
        assert_eq!(error.path.to_string(), "sounds.1");
        assert_eq!(error.description, "3 is not of type 'string'");

        let error = protocol
            .decode(&pet(), &json!({"tags": {"age": "old"}}))
            .unwrap_err();
        assert_eq!(error.path, path(&["tags", "age"]));

        let error = protocol.decode(&pet(), &json!(["Tom"])).unwrap_err();
        assert!(error.path.is_empty());
        assert_eq!(error.description, "[\"Tom\"] is not of type 'object'");
    }

    #[test]
    fn nested_errors_prepend_the_parent() {
        let child = MessageType::builder("Child")
            .field(FieldSpec::string("string_value"))
            .build()
            .unwrap();
        let parent = MessageType::builder("Parent")
            .field(FieldSpec::message("parent", &child))
            .build()
            .unwrap();

        let error = JsonProtocol::new()
            .decode(&parent, &json!({"parent": {"stringValue": 42}}))
            .unwrap_err();
        assert_eq!(error.path, path(&["parent", "stringValue"]));
        assert_eq!(error.description, "42 is not of type 'string'");
    }

    #[test]
    fn numbers_are_normalized() {
        let protocol = JsonProtocol::new();
        let pet = pet();

        let message = protocol
            .decode(&pet, &json!({"petId": 3.0, "weight": 4}))
            .unwrap();
        assert_eq!(message.get("pet_id").unwrap(), Value::Int(3));
        assert_eq!(message.get("weight").unwrap(), Value::Float(4.0));

        assert!(protocol.decode(&pet, &json!({"petId": 3.5})).is_err());

        let error = protocol
            .decode(&pet, &json!({"tags": {"age": 3_000_000_000i64}}))
            .unwrap_err();
        assert_eq!(error.description, "3000000000 is out of range for 'int32'");
    }

    #[test]
    fn malformed_bytes_are_invalid_payloads() {
        let error = JsonProtocol::new().unpack(&pet(), b"{\"name\":").unwrap_err();
        assert_eq!(error.kind, ValidationErrorKind::InvalidPayload);
        assert!(error.description.starts_with("Invalid payload: "));
        assert!(error.path.is_empty());
    }

    #[test]
    fn wire_forms() {
        let protocol = JsonProtocol::new();

        let wrapper = Message::from_fields(&well_known::STRING_VALUE, [("value", "hi")]).unwrap();
        assert_eq!(protocol.encode(&wrapper).unwrap(), json!("hi"));
        assert_eq!(
            protocol
                .decode(&well_known::STRING_VALUE, &json!("hi"))
                .unwrap(),
            wrapper
        );

        let mask = Message::from_fields(&well_known::FIELD_MASK, [("paths", vec!["a", "b"])])
            .unwrap();
        assert_eq!(protocol.encode(&mask).unwrap(), json!("a,b"));
        assert_eq!(
            protocol
                .decode(&well_known::FIELD_MASK, &json!("a,b"))
                .unwrap(),
            mask
        );

        let timestamp = protocol
            .decode(&well_known::TIMESTAMP, &json!("1970-01-01T00:00:01.25Z"))
            .unwrap();
        assert_eq!(timestamp.get("seconds").unwrap(), Value::Int(1));
        assert_eq!(timestamp.get("nanos").unwrap(), Value::Int(250_000_000));
        assert_eq!(
            protocol.encode(&timestamp).unwrap(),
            json!("1970-01-01T00:00:01.250Z")
        );

        let date = protocol
            .decode(&well_known::TIMESTAMP, &json!("1970-01-02"))
            .unwrap();
        assert_eq!(date.get("seconds").unwrap(), Value::Int(86_400));

        let error = protocol
            .decode(&well_known::TIMESTAMP, &json!("yesterday"))
            .unwrap_err();
        assert_eq!(error.description, "'yesterday' is not a 'date' or 'date-time'");
    }

    #[test]
    fn partial_field_sets() {
        let protocol = JsonProtocol::new();
        let pet = pet();
        let message = Message::from_fields(
            &pet,
            [("pet_id", Value::Int(7)), ("name", Value::from("Tom"))],
        )
        .unwrap();

        let body = protocol
            .encode_fields(&message, &["name".to_string()])
            .unwrap();
        assert_eq!(body, json!({"name": "Tom"}));

        let mut decoded = Message::from_fields(&pet, [("pet_id", 7)]).unwrap();
        protocol
            .decode_fields_into(
                &mut decoded,
                &json!({"petId": 8, "name": "Tom"}),
                &["name".to_string()],
            )
            .unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn codecs_are_compiled_once() {
        let protocol = JsonProtocol::with_cache_limit(Some(10));
        let pet = pet();

        protocol.encode(&Message::new(&pet)).unwrap();
        protocol.encode(&Message::new(&pet)).unwrap();
        assert_eq!(protocol.compiled.len(), 1);
    }
}
