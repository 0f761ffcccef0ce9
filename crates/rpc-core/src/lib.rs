// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Turns plain async handlers into RPC methods.
//!
//! A handler declares its [`Signature`]. Binding it (see [`inspection`]) derives the request and
//! response message types and a uniform `(service, request) -> response` invocation. A
//! [`service::ServiceBuilder`] then prepares each method's HTTP contract: verb, path template,
//! success status and the path/query/body partition of the request fields.

pub mod arguments;
pub mod context;
pub mod error;
pub mod inspection;
pub mod method;
pub mod resolver;
pub mod service;
pub mod signature;

pub use arguments::{Arguments, HandlerFn, handler};
pub use context::CallContext;
pub use error::BindingError;
pub use method::{HttpFieldLocation, HttpVerb, Method, MethodDescriptor, Rpc};
pub use resolver::{ConstantResolver, Resolver, ServiceResolver};
pub use service::{
    BoundService, RpcTransport, Service, ServiceBuilder, ServiceEndpoint, ServiceInfo, Stub,
    StubBuilder,
};
pub use signature::{Param, ReturnType, Signature};
