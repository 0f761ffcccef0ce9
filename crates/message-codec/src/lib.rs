// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Wire codecs for messages. Each protocol compiles a per-type codec on first use and keeps it
//! in a [`message_model::cache::CompiledCache`].

mod error;
mod json;
mod protocol;
mod uri;

pub use error::EncodeError;
pub use json::JsonProtocol;
pub use protocol::Protocol;
pub use uri::UriStringProtocol;
