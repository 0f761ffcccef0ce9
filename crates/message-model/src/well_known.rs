// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Message types shared by the whole process: the empty message, single-value wrappers,
//! timestamps and field masks.

use std::sync::LazyLock;

use crate::{
    field::{FieldKind, FieldSpec, ScalarType},
    message::{MessageType, WireForm},
};

fn well_known(name: &str, fields: Vec<FieldSpec>, wire_form: WireForm) -> MessageType {
    MessageType::builder(name)
        .fields(fields)
        .with_wire_form(wire_form)
        .build()
        .expect("well-known message types are valid")
}

fn wrapper(name: &str, scalar: ScalarType) -> MessageType {
    well_known(
        name,
        vec![FieldSpec::new("value", FieldKind::Scalar(scalar))],
        WireForm::BareValue,
    )
}

pub static EMPTY: LazyLock<MessageType> =
    LazyLock::new(|| well_known("Empty", vec![], WireForm::Object));

pub static STRING_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("StringValue", ScalarType::String));

pub static BYTES_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("BytesValue", ScalarType::Bytes));

pub static BOOL_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("BoolValue", ScalarType::Bool));

pub static INT32_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("Int32Value", ScalarType::Int32));

pub static INT64_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("Int64Value", ScalarType::Int64));

pub static FLOAT32_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("Float32Value", ScalarType::Float32));

pub static FLOAT64_VALUE: LazyLock<MessageType> =
    LazyLock::new(|| wrapper("Float64Value", ScalarType::Float64));

pub use self::FLOAT64_VALUE as NUMBER_VALUE;
pub use self::INT64_VALUE as INTEGER_VALUE;

pub static TIMESTAMP: LazyLock<MessageType> = LazyLock::new(|| {
    well_known(
        "Timestamp",
        vec![FieldSpec::int64("seconds"), FieldSpec::int32("nanos")],
        WireForm::Timestamp,
    )
});

pub static FIELD_MASK: LazyLock<MessageType> = LazyLock::new(|| {
    well_known(
        "FieldMask",
        vec![FieldSpec::repeated(
            "paths",
            FieldKind::Scalar(ScalarType::String),
        )],
        WireForm::CommaJoined,
    )
});

pub fn empty() -> MessageType {
    EMPTY.clone()
}

pub fn is_empty_type(message_type: &MessageType) -> bool {
    message_type == &*EMPTY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_types_are_singletons() {
        assert_eq!(empty(), *EMPTY);
        assert!(is_empty_type(&EMPTY));
        assert!(!EMPTY.has_fields());

        assert_eq!(INTEGER_VALUE.name(), "Int64Value");
        assert_eq!(NUMBER_VALUE.wire_form(), WireForm::BareValue);
        assert_eq!(TIMESTAMP.field_count(), 2);
        assert_eq!(FIELD_MASK.wire_form(), WireForm::CommaJoined);
    }
}
