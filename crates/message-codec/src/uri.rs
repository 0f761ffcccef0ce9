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
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use url::form_urlencoded;

use common::error::{ValidationError, ValidationErrorKind};
use message_model::{Message, MessageType, Value};

use crate::{
    error::EncodeError,
    json::{CompiledField, FieldCoder, JsonProtocol, model_error},
    protocol::Protocol,
};

fn not_formatted(raw: &str, expected: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::TypeMismatch,
        format!("'{raw}' is not formatted as a '{expected}'"),
    )
}

/// Codec for values carried as strings in a URI: path parameters and query strings.
///
/// Scalars are parsed from their textual form. Repeated fields take one value per occurrence of
/// the key. Messages, maps and converter values are read as JSON text; text that isn't JSON is
/// taken as a JSON string (so a timestamp can be written without quotes).
pub struct UriStringProtocol {
    json: Arc<JsonProtocol>,
}

impl UriStringProtocol {
    pub fn new(json: Arc<JsonProtocol>) -> Self {
        Self { json }
    }

    /// Decode `(json name, raw value)` pairs into `message`, reading only the named fields when
    /// `fields` is given. Keys that match no field are ignored. For fields that aren't repeated
    /// the last occurrence of a key wins.
    pub fn decode_into<K: AsRef<str>, V: AsRef<str>>(
        &self,
        message: &mut Message,
        pairs: impl IntoIterator<Item = (K, V)>,
        fields: Option<&[String]>,
    ) -> Result<(), ValidationError> {
        let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in pairs {
            grouped
                .entry(key.as_ref().to_string())
                .or_default()
                .push(value.as_ref().to_string());
        }

        let compiled = self
            .json
            .compiled(message.message_type())
            .map_err(model_error)?;

        for field in compiled.fields().iter().filter(|field| {
            fields.is_none_or(|names| names.iter().any(|name| name == &field.name))
        }) {
            let Some(raw_values) = grouped.get(&field.json_name) else {
                continue;
            };

            self.decode_field(field, raw_values)
                .and_then(|value| message.set(&field.name, value).map_err(model_error))
                .map_err(|error| error.with_field(&field.json_name))?;
        }

        Ok(())
    }

    /// `(json name, text)` pairs for the present fields (restricted to `fields` when given).
    /// Repeated fields yield one pair per item.
    pub fn encode(
        &self,
        message: &Message,
        fields: Option<&[String]>,
    ) -> Result<Vec<(String, String)>, EncodeError> {
        let compiled = self.json.compiled(message.message_type())?;

        let mut pairs = vec![];
        for field in compiled.fields().iter().filter(|field| {
            fields.is_none_or(|names| names.iter().any(|name| name == &field.name))
        }) {
            let Some(value) = message.get_present(&field.name) else {
                continue;
            };

            let encoded = self
                .encode_field(field, value)
                .map_err(|error| error.with_field(&field.json_name))?;
            pairs.extend(
                encoded
                    .into_iter()
                    .map(|text| (field.json_name.clone(), text)),
            );
        }

        Ok(pairs)
    }

    /// The text of a single (non-repeated) field value, as used to fill a path template.
    pub fn encode_value(&self, message: &Message, field_name: &str) -> Result<String, EncodeError> {
        let compiled = self.json.compiled(message.message_type())?;
        let field = compiled
            .fields()
            .iter()
            .find(|field| field.name == field_name)
            .ok_or_else(|| {
                EncodeError::new(format!(
                    "Message '{}' has no field '{field_name}'",
                    message.message_type().name()
                ))
            })?;

        let value = message.get(field_name)?;
        self.encode_text(&field.coder, &value)
            .map_err(|error| error.with_field(&field.json_name))
    }

    fn decode_field(
        &self,
        field: &CompiledField,
        raw_values: &[String],
    ) -> Result<Value, ValidationError> {
        match &field.coder {
            FieldCoder::Repeated(item) => raw_values
                .iter()
                .enumerate()
                .map(|(index, raw)| {
                    self.decode_text(item, raw)
                        .map_err(|error| error.with_index(index))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            coder => match raw_values.last() {
                Some(raw) => self.decode_text(coder, raw),
                None => Ok(Value::Null),
            },
        }
    }

    fn decode_text(&self, coder: &FieldCoder, raw: &str) -> Result<Value, ValidationError> {
        match coder {
            FieldCoder::String => Ok(Value::from(raw)),
            FieldCoder::Bytes => STANDARD
                .decode(raw)
                .map(|bytes| Value::Bytes(bytes.into()))
                .map_err(|_| not_formatted(raw, "bytes")),
            FieldCoder::Bool => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(not_formatted(raw, "boolean")),
            },
            FieldCoder::Integer { int32 } => {
                let integer: i64 = raw.parse().map_err(|_| not_formatted(raw, "integer"))?;
                if *int32 && i32::try_from(integer).is_err() {
                    Err(not_formatted(raw, "int32"))
                } else {
                    Ok(Value::Int(integer))
                }
            }
            FieldCoder::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| not_formatted(raw, "number")),
            FieldCoder::Message(_)
            | FieldCoder::Repeated(_)
            | FieldCoder::Map(_)
            | FieldCoder::Converter(_) => {
                let value = serde_json::from_str::<JsonValue>(raw)
                    .unwrap_or_else(|_| JsonValue::String(raw.to_string()));
                self.json.decode_value(coder, &value)
            }
        }
    }

    fn encode_field(&self, field: &CompiledField, value: &Value) -> Result<Vec<String>, EncodeError> {
        match &field.coder {
            FieldCoder::Repeated(item) => value
                .as_list()
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(index, item_value)| {
                    self.encode_text(item, item_value)
                        .map_err(|error| error.with_index(index))
                })
                .collect(),
            coder => Ok(vec![self.encode_text(coder, value)?]),
        }
    }

    fn encode_text(&self, coder: &FieldCoder, value: &Value) -> Result<String, EncodeError> {
        let text = match coder {
            FieldCoder::String => value.as_str().map(str::to_string),
            FieldCoder::Bytes => value.as_bytes().map(|bytes| STANDARD.encode(bytes)),
            FieldCoder::Bool => value.as_bool().map(|value| value.to_string()),
            FieldCoder::Integer { .. } => value.as_i64().map(|value| value.to_string()),
            FieldCoder::Float => value.as_f64().map(|value| value.to_string()),
            FieldCoder::Message(_)
            | FieldCoder::Repeated(_)
            | FieldCoder::Map(_)
            | FieldCoder::Converter(_) => {
                return Ok(match self.json.encode_value(coder, value)? {
                    // Bare strings unless they would read back as some other JSON value
                    JsonValue::String(text) if serde_json::from_str::<JsonValue>(&text).is_err() => {
                        text
                    }
                    other => other.to_string(),
                });
            }
        };

        text.ok_or_else(|| EncodeError::new(format!("{value} cannot be written as text")))
    }
}

impl Protocol for UriStringProtocol {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn mime_type(&self) -> &'static str {
        "application/x-www-form-urlencoded"
    }

    fn pack(&self, message: &Message) -> Result<Vec<u8>, EncodeError> {
        let pairs = self.encode(message, None)?;
        Ok(form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
            .into_bytes())
    }

    fn unpack(&self, message_type: &MessageType, bytes: &[u8]) -> Result<Message, ValidationError> {
        let mut message = Message::new(message_type);
        self.decode_into(&mut message, form_urlencoded::parse(bytes), None)?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_model::{FieldKind, FieldSpec, ScalarType, well_known};

    fn protocol() -> UriStringProtocol {
        UriStringProtocol::new(Arc::new(JsonProtocol::new()))
    }

    fn query() -> MessageType {
        let filter = MessageType::builder("Filter")
            .field(FieldSpec::string("owner"))
            .build()
            .unwrap();

        MessageType::builder("ListPets")
            .field(FieldSpec::int32("page_size"))
            .field(FieldSpec::bool("include_adopted"))
            .field(FieldSpec::float64("max_weight"))
            .field(FieldSpec::repeated(
                "tags",
                FieldKind::Scalar(ScalarType::String),
            ))
            .field(FieldSpec::message("filter", &filter))
            .field(FieldSpec::date_time("since"))
            .field(FieldSpec::message("label", &well_known::STRING_VALUE))
            .build()
            .unwrap()
    }

    #[test]
    fn decodes_scalars_from_text() {
        let message = protocol()
            .unpack(
                &query(),
                b"pageSize=10&includeAdopted=true&maxWeight=2.5&tags=a&tags=b&unknown=1",
            )
            .unwrap();

        assert_eq!(message.get("page_size").unwrap(), Value::Int(10));
        assert_eq!(message.get("include_adopted").unwrap(), Value::Bool(true));
        assert_eq!(message.get("max_weight").unwrap(), Value::Float(2.5));
        assert_eq!(
            message.get("tags").unwrap(),
            Value::from(vec!["a", "b"])
        );
    }

    #[test]
    fn decodes_structured_values_as_json() {
        let message = protocol()
            .unpack(
                &query(),
                b"filter=%7B%22owner%22%3A%22ann%22%7D&since=2020-01-01T00%3A00%3A00Z&label=hello",
            )
            .unwrap();

        let filter = message.get("filter").unwrap();
        assert_eq!(
            filter.as_message().unwrap().get("owner").unwrap(),
            Value::from("ann")
        );
        assert!(matches!(message.get("since").unwrap(), Value::DateTime(_)));
        assert_eq!(
            message
                .get("label")
                .unwrap()
                .as_message()
                .unwrap()
                .get("value")
                .unwrap(),
            Value::from("hello")
        );
    }

    #[test]
    fn malformed_text_names_the_field() {
        let error = protocol()
            .unpack(&query(), b"pageSize=ten")
            .unwrap_err();
        assert_eq!(error.description, "'ten' is not formatted as a 'integer'");
        assert_eq!(error.path.to_string(), "pageSize");

        let error = protocol()
            .unpack(&query(), b"tags=a&includeAdopted=yes")
            .unwrap_err();
        assert_eq!(error.path.to_string(), "includeAdopted");
    }

    #[test]
    fn subsets_and_round_trip() {
        let protocol = protocol();
        let message_type = query();

        let message = protocol
            .unpack(
                &message_type,
                b"pageSize=10&tags=a&tags=b&since=2020-01-01T00%3A00%3A00Z&label=hello",
            )
            .unwrap();

        let packed = protocol.pack(&message).unwrap();
        assert_eq!(protocol.unpack(&message_type, &packed).unwrap(), message);

        let pairs = protocol
            .encode(&message, Some(&["page_size".to_string()]))
            .unwrap();
        assert_eq!(pairs, vec![("pageSize".to_string(), "10".to_string())]);

        assert_eq!(protocol.encode_value(&message, "page_size").unwrap(), "10");
    }

    #[test]
    fn strings_that_look_like_json_are_quoted() {
        let protocol = protocol();
        let message_type = query();
        let label = Message::from_fields(&well_known::STRING_VALUE, [("value", "123")]).unwrap();
        let message = Message::from_fields(&message_type, [("label", label)]).unwrap();

        assert_eq!(protocol.encode_value(&message, "label").unwrap(), "\"123\"");

        let packed = protocol.pack(&message).unwrap();
        assert_eq!(protocol.unpack(&message_type, &packed).unwrap(), message);
    }
}
