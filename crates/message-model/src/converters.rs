// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    converter::Converter,
    error::ModelError,
    message::{Message, MessageType},
    native_type::NativeType,
    value::Value,
    well_known,
};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Converts a single-value wrapper message to its bare value.
#[derive(Debug)]
pub struct ValueConverter {
    wire: MessageType,
    native: NativeType,
}

impl ValueConverter {
    pub fn new(wire: &MessageType, native: NativeType) -> Self {
        Self {
            wire: wire.clone(),
            native,
        }
    }
}

impl Converter for ValueConverter {
    fn wire(&self) -> &MessageType {
        &self.wire
    }

    fn native(&self) -> &NativeType {
        &self.native
    }

    fn resolve(&self, message: &Message) -> Result<Value, ModelError> {
        message.get("value")
    }

    fn format(&self, value: &Value) -> Result<Message, ModelError> {
        Message::from_fields(&self.wire, [("value", value.clone())])
    }
}

#[derive(Debug)]
pub struct DateTimeConverter {
    wire: MessageType,
    native: NativeType,
}

impl DateTimeConverter {
    pub fn new() -> Self {
        Self {
            wire: well_known::TIMESTAMP.clone(),
            native: NativeType::DateTime,
        }
    }
}

impl Default for DateTimeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for DateTimeConverter {
    fn wire(&self) -> &MessageType {
        &self.wire
    }

    fn native(&self) -> &NativeType {
        &self.native
    }

    fn resolve(&self, message: &Message) -> Result<Value, ModelError> {
        timestamp_to_date_time(message).map(Value::DateTime)
    }

    fn format(&self, value: &Value) -> Result<Message, ModelError> {
        match value {
            Value::DateTime(date_time) => date_time_to_timestamp(date_time),
            other => Err(native_mismatch(&self.native, other)),
        }
    }
}

/// Dates travel as the timestamp of their UTC midnight.
#[derive(Debug)]
pub struct DateConverter {
    wire: MessageType,
    native: NativeType,
}

impl DateConverter {
    pub fn new() -> Self {
        Self {
            wire: well_known::TIMESTAMP.clone(),
            native: NativeType::Date,
        }
    }
}

impl Default for DateConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for DateConverter {
    fn wire(&self) -> &MessageType {
        &self.wire
    }

    fn native(&self) -> &NativeType {
        &self.native
    }

    fn resolve(&self, message: &Message) -> Result<Value, ModelError> {
        timestamp_to_date_time(message).map(|date_time| Value::Date(date_time.date_naive()))
    }

    fn format(&self, value: &Value) -> Result<Message, ModelError> {
        match value {
            Value::Date(date) => date_time_to_timestamp(&date_midnight(date)?),
            other => Err(native_mismatch(&self.native, other)),
        }
    }
}

fn native_mismatch(native: &NativeType, value: &Value) -> ModelError {
    ModelError::TypeMismatch {
        field: "value".to_string(),
        expected: native.to_string(),
        actual: format!("{value} ({})", value.type_name()),
    }
}

fn date_midnight(date: &NaiveDate) -> Result<DateTime<Utc>, ModelError> {
    date.and_hms_opt(0, 0, 0)
        .map(|date_time| date_time.and_utc())
        .ok_or_else(|| ModelError::InvalidValue {
            field: "value".to_string(),
            reason: format!("{date} has no midnight"),
        })
}

/// Split a date-time into `Timestamp { seconds, nanos }` (nanos always in `0..1e9`).
///
/// A leap second has no timestamp of its own: it is clamped to the last nanosecond of the
/// second it extends.
pub fn date_time_to_timestamp(date_time: &DateTime<Utc>) -> Result<Message, ModelError> {
    let nanos = date_time
        .timestamp_subsec_nanos()
        .min(NANOS_PER_SECOND as u32 - 1);

    Message::from_fields(
        &well_known::TIMESTAMP,
        [
            ("seconds", Value::Int(date_time.timestamp())),
            ("nanos", Value::Int(nanos as i64)),
        ],
    )
}

/// Recombine a `Timestamp` into a date-time. Out-of-range nanos carry into the seconds.
pub fn timestamp_to_date_time(timestamp: &Message) -> Result<DateTime<Utc>, ModelError> {
    let seconds = timestamp.get("seconds")?.as_i64().unwrap_or_default();
    let nanos = timestamp.get("nanos")?.as_i64().unwrap_or_default();

    let seconds = seconds.checked_add(nanos.div_euclid(NANOS_PER_SECOND));
    let nanos = nanos.rem_euclid(NANOS_PER_SECOND) as u32;

    seconds
        .and_then(|seconds| DateTime::from_timestamp(seconds, nanos))
        .ok_or_else(|| ModelError::InvalidValue {
            field: "seconds".to_string(),
            reason: "timestamp is out of range".to_string(),
        })
}

static STRING_VALUE_CONVERTER: LazyLock<Arc<dyn Converter>> = LazyLock::new(|| {
    Arc::new(ValueConverter::new(
        &well_known::STRING_VALUE,
        NativeType::String,
    ))
});

static BOOL_VALUE_CONVERTER: LazyLock<Arc<dyn Converter>> =
    LazyLock::new(|| Arc::new(ValueConverter::new(&well_known::BOOL_VALUE, NativeType::Bool)));

static INT32_VALUE_CONVERTER: LazyLock<Arc<dyn Converter>> = LazyLock::new(|| {
    Arc::new(ValueConverter::new(
        &well_known::INT32_VALUE,
        NativeType::Int32,
    ))
});

static INT64_VALUE_CONVERTER: LazyLock<Arc<dyn Converter>> = LazyLock::new(|| {
    Arc::new(ValueConverter::new(
        &well_known::INT64_VALUE,
        NativeType::Int64,
    ))
});

static FLOAT32_VALUE_CONVERTER: LazyLock<Arc<dyn Converter>> = LazyLock::new(|| {
    Arc::new(ValueConverter::new(
        &well_known::FLOAT32_VALUE,
        NativeType::Float32,
    ))
});

static FLOAT64_VALUE_CONVERTER: LazyLock<Arc<dyn Converter>> = LazyLock::new(|| {
    Arc::new(ValueConverter::new(
        &well_known::FLOAT64_VALUE,
        NativeType::Float64,
    ))
});

static DATE_TIME_CONVERTER: LazyLock<Arc<dyn Converter>> =
    LazyLock::new(|| Arc::new(DateTimeConverter::new()));

static DATE_CONVERTER: LazyLock<Arc<dyn Converter>> =
    LazyLock::new(|| Arc::new(DateConverter::new()));

pub fn string_value_converter() -> Arc<dyn Converter> {
    STRING_VALUE_CONVERTER.clone()
}

pub fn bool_value_converter() -> Arc<dyn Converter> {
    BOOL_VALUE_CONVERTER.clone()
}

pub fn int32_value_converter() -> Arc<dyn Converter> {
    INT32_VALUE_CONVERTER.clone()
}

pub fn int64_value_converter() -> Arc<dyn Converter> {
    INT64_VALUE_CONVERTER.clone()
}

pub fn float32_value_converter() -> Arc<dyn Converter> {
    FLOAT32_VALUE_CONVERTER.clone()
}

pub fn float64_value_converter() -> Arc<dyn Converter> {
    FLOAT64_VALUE_CONVERTER.clone()
}

pub fn date_time_converter() -> Arc<dyn Converter> {
    DATE_TIME_CONVERTER.clone()
}

pub fn date_converter() -> Arc<dyn Converter> {
    DATE_CONVERTER.clone()
}

/// The converters every service starts with.
pub fn default_converters() -> Vec<Arc<dyn Converter>> {
    vec![
        string_value_converter(),
        int64_value_converter(),
        float64_value_converter(),
        bool_value_converter(),
        int32_value_converter(),
        float32_value_converter(),
        date_time_converter(),
        date_converter(),
    ]
}
