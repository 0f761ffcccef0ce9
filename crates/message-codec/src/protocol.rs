// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::error::ValidationError;
use message_model::{Message, MessageType};

use crate::error::EncodeError;

/// A wire format for whole messages.
pub trait Protocol: Send + Sync {
    fn name(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;

    fn pack(&self, message: &Message) -> Result<Vec<u8>, EncodeError>;

    /// Malformed input fails with an "invalid payload" error and an empty path. Values of the
    /// wrong type fail with the path of the offending field.
    fn unpack(&self, message_type: &MessageType, bytes: &[u8]) -> Result<Message, ValidationError>;
}
