// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{any::Any, future::Future, sync::Arc};

use common::error::RpcError;
use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use message_model::{Message, Value};

use crate::context::CallContext;

pub type ResolvedValue = Arc<dyn Any + Send + Sync>;

/// The values a bound handler is called with, keyed by parameter name.
///
/// Message-derived arguments are [`Value`]s. Arguments injected by resolvers are kept
/// type-erased and recovered with [`Arguments::resolved`].
#[derive(Default, Clone)]
pub struct Arguments {
    values: IndexMap<String, Value>,
    resolved: IndexMap<String, ResolvedValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub(crate) fn insert_resolved(&mut self, name: &str, value: ResolvedValue) {
        self.resolved.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_message(&self, name: &str) -> Option<&Message> {
        self.get(name).and_then(Value::as_message)
    }

    /// The whole request, for handlers taking a `request` message parameter.
    pub fn request(&self) -> Option<&Message> {
        self.get_message("request")
    }

    pub fn resolved<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.resolved
            .get(name)
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("values", &self.values)
            .field("resolved", &self.resolved.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub type HandlerFn<S> =
    Arc<dyn Fn(Arc<S>, Arguments, CallContext) -> BoxFuture<'static, Result<Value, RpcError>> + Send + Sync>;

/// Box an async closure into a [`HandlerFn`].
///
/// ```ignore
/// let greet = handler(|_service: Arc<Greeter>, args: Arguments, _ctx| async move {
///     Ok(Value::from(format!("Hello, {}", args.get_str("name").unwrap_or_default())))
/// });
/// ```
pub fn handler<S, F, Fut>(f: F) -> HandlerFn<S>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Arguments, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    Arc::new(move |service, arguments, context| f(service, arguments, context).boxed())
}
