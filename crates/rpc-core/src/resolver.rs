// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;
use common::error::RpcError;
use message_model::{Message, NativeType};

use crate::{arguments::ResolvedValue, context::CallContext};

/// Supplies a handler argument that does not come from the request message (a database
/// connection, the caller's identity and so on).
///
/// A method with `n` resolvers binds them, in order, to its first `n` parameters. Those
/// parameters take no part in request inference. All resolvers of a call run concurrently
/// before the handler; the first failure fails the call.
#[async_trait]
pub trait Resolver<S>: Send + Sync {
    /// The native type of the produced value, checked against the parameter when binding.
    fn native(&self) -> NativeType;

    async fn resolve(
        &self,
        service: &S,
        request: &Message,
        context: &CallContext,
    ) -> Result<ResolvedValue, RpcError>;
}

/// A resolver that hands out a clone of a fixed value.
pub struct ConstantResolver<T> {
    native: NativeType,
    value: T,
}

impl<T> ConstantResolver<T> {
    pub fn new(native: NativeType, value: T) -> Self {
        Self { native, value }
    }
}

#[async_trait]
impl<S, T> Resolver<S> for ConstantResolver<T>
where
    S: Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    fn native(&self) -> NativeType {
        self.native.clone()
    }

    async fn resolve(
        &self,
        _service: &S,
        _request: &Message,
        _context: &CallContext,
    ) -> Result<ResolvedValue, RpcError> {
        Ok(std::sync::Arc::new(self.value.clone()))
    }
}

/// A resolver reading a value off the service instance, for example a shared context.
pub struct ServiceResolver<S, T> {
    native: NativeType,
    extract: Box<dyn Fn(&S) -> T + Send + Sync>,
}

impl<S, T> ServiceResolver<S, T> {
    pub fn new(native: NativeType, extract: impl Fn(&S) -> T + Send + Sync + 'static) -> Self {
        Self {
            native,
            extract: Box::new(extract),
        }
    }
}

#[async_trait]
impl<S, T> Resolver<S> for ServiceResolver<S, T>
where
    S: Send + Sync,
    T: Send + Sync + 'static,
{
    fn native(&self) -> NativeType {
        self.native.clone()
    }

    async fn resolve(
        &self,
        service: &S,
        _request: &Message,
        _context: &CallContext,
    ) -> Result<ResolvedValue, RpcError> {
        Ok(std::sync::Arc::new((self.extract)(service)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_model::well_known;

    struct Shop {
        currency: &'static str,
    }

    #[tokio::test]
    async fn resolves_constants_and_service_state() {
        let shop = Shop { currency: "EUR" };
        let request = Message::new(&well_known::empty());
        let context = CallContext::new();

        let constant = ConstantResolver::new(NativeType::Int64, 42_i64);
        let value = Resolver::<Shop>::resolve(&constant, &shop, &request, &context)
            .await
            .unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&42));

        let currency = ServiceResolver::new(NativeType::String, |shop: &Shop| shop.currency);
        assert_eq!(Resolver::<Shop>::native(&currency), NativeType::String);
        let value = currency.resolve(&shop, &request, &context).await.unwrap();
        assert_eq!(value.downcast_ref::<&str>(), Some(&"EUR"));
    }
}
