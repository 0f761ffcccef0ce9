// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! HTTP bindings for prepared methods: [`HttpRpcRouter`] serves them, [`RpcClient`] calls them.
//! Both sides split request fields between the path, the query string and the body by each
//! method's field-location partition.

mod client;
mod error;
mod router;
mod segment;

pub use client::{ClientRequest, ClientResponse, ClientTransport, RpcClient};
pub use error::RouterError;
pub use router::HttpRpcRouter;
