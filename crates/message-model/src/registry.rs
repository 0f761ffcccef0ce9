// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Two-phase construction for message types that refer to each other (or to themselves) by
//! name.
//!
//! ```ignore
//! let mut registry = MessageRegistry::new();
//! registry.declare(
//!     MessageType::builder("Node")
//!         .field(FieldSpec::string("label"))
//!         .field(FieldSpec::repeated("children", FieldKind::message_named("Node"))),
//! )?;
//! registry.resolve()?;
//! let node = registry.get("Node").unwrap();
//! ```

use indexmap::IndexMap;

use crate::{
    error::ModelError,
    message::{MessageBuilder, MessageType},
};

#[derive(Default)]
pub struct MessageRegistry {
    declared: Vec<MessageBuilder>,
    types: IndexMap<String, MessageType>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(&self, name: &str) -> Result<(), ModelError> {
        if self.types.contains_key(name)
            || self.declared.iter().any(|builder| builder.name() == name)
        {
            Err(ModelError::DuplicateMessage(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Declare a type to be built by [`MessageRegistry::resolve`].
    pub fn declare(&mut self, builder: MessageBuilder) -> Result<(), ModelError> {
        self.check_unique(builder.name())?;
        self.declared.push(builder);
        Ok(())
    }

    /// Make an already built type available to references by name.
    pub fn register(&mut self, message_type: &MessageType) -> Result<(), ModelError> {
        self.check_unique(message_type.name())?;
        self.types
            .insert(message_type.name().to_string(), message_type.clone());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MessageType> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &MessageType> {
        self.types.values()
    }

    /// Build every declared type, then bind each reference by name. Fails on the first name
    /// that matches no declared or registered type.
    pub fn resolve(&mut self) -> Result<(), ModelError> {
        let declared = std::mem::take(&mut self.declared);

        let mut built = Vec::with_capacity(declared.len());
        for builder in declared {
            let message_type = builder.build_unresolved()?;
            self.types
                .insert(message_type.name().to_string(), message_type.clone());
            built.push(message_type);
        }

        for message_type in &built {
            for message_ref in message_type.unresolved_references() {
                let target = self
                    .types
                    .get(message_ref.name())
                    .ok_or_else(|| ModelError::UnresolvedReference(message_ref.name().to_string()))?;
                message_ref.bind(target);
            }
        }

        for message_type in &built {
            for field in message_type.fields() {
                field.verify_default(message_type.name())?;
            }
        }

        tracing::debug!(count = built.len(), "Resolved message types");

        Ok(())
    }
}
