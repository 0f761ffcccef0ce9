// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-field constraints, a subset of JSON Schema's validation keywords.
//!
//! For repeated fields, the string and numeric constraints apply to each item while the
//! `*_items` constraints apply to the sequence. Map fields work the same way, with
//! `*_properties` applying to the map.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberBound {
    Int(i64),
    Float(f64),
}

impl Display for NumberBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberBound::Int(value) => write!(f, "{value}"),
            NumberBound::Float(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i32> for NumberBound {
    fn from(value: i32) -> Self {
        NumberBound::Int(value as i64)
    }
}

impl From<i64> for NumberBound {
    fn from(value: i64) -> Self {
        NumberBound::Int(value)
    }
}

impl From<f64> for NumberBound {
    fn from(value: f64) -> Self {
        NumberBound::Float(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub minimum: Option<NumberBound>,
    pub exclusive_minimum: bool,
    pub maximum: Option<NumberBound>,
    pub exclusive_maximum: bool,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self == &Schema::default()
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// The value must contain a match (the pattern is not anchored).
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_minimum(mut self, minimum: impl Into<NumberBound>) -> Self {
        self.minimum = Some(minimum.into());
        self
    }

    pub fn with_exclusive_minimum(mut self, minimum: impl Into<NumberBound>) -> Self {
        self.minimum = Some(minimum.into());
        self.exclusive_minimum = true;
        self
    }

    pub fn with_maximum(mut self, maximum: impl Into<NumberBound>) -> Self {
        self.maximum = Some(maximum.into());
        self
    }

    pub fn with_exclusive_maximum(mut self, maximum: impl Into<NumberBound>) -> Self {
        self.maximum = Some(maximum.into());
        self.exclusive_maximum = true;
        self
    }

    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = Some(min_items);
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn with_unique_items(mut self) -> Self {
        self.unique_items = true;
        self
    }

    pub fn with_min_properties(mut self, min_properties: usize) -> Self {
        self.min_properties = Some(min_properties);
        self
    }

    pub fn with_max_properties(mut self, max_properties: usize) -> Self {
        self.max_properties = Some(max_properties);
        self
    }

    pub(crate) fn has_length_constraints(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some() || self.pattern.is_some()
    }

    pub(crate) fn has_number_constraints(&self) -> bool {
        self.minimum.is_some() || self.maximum.is_some()
    }

    pub(crate) fn has_item_constraints(&self) -> bool {
        self.min_items.is_some() || self.max_items.is_some() || self.unique_items
    }

    pub(crate) fn has_property_constraints(&self) -> bool {
        self.min_properties.is_some() || self.max_properties.is_some()
    }

    /// Names of the constraints set in this schema (in their JSON Schema spelling).
    pub(crate) fn constraint_names(&self) -> Vec<&'static str> {
        let mut names = vec![];
        let checks = [
            (self.min_length.is_some(), "minLength"),
            (self.max_length.is_some(), "maxLength"),
            (self.pattern.is_some(), "pattern"),
            (self.minimum.is_some(), "minimum"),
            (self.maximum.is_some(), "maximum"),
            (self.min_items.is_some(), "minItems"),
            (self.max_items.is_some(), "maxItems"),
            (self.unique_items, "uniqueItems"),
            (self.min_properties.is_some(), "minProperties"),
            (self.max_properties.is_some(), "maxProperties"),
        ];
        for (set, name) in checks {
            if set {
                names.push(name);
            }
        }
        names
    }
}
