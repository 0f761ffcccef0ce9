// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_trait::async_trait;
use common::error::RpcError;
use indexmap::IndexMap;
use message_model::{Converter, Message, converters::default_converters};
use message_validation::MessageValidator;

use crate::{
    context::CallContext,
    error::BindingError,
    method::{Method, MethodDescriptor, Rpc},
};

const NAME_SUFFIXES: [&str; 3] = ["service", "remote", "stub"];

/// The default service name: the lower-cased type name without a trailing `service`, `remote`
/// or `stub`.
pub fn service_name(type_name: &str) -> String {
    let name = type_name.to_lowercase();
    NAME_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .map(str::to_string)
        .unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    name: String,
    http_path: String,
}

impl ServiceInfo {
    pub fn new(type_name: &str, name: Option<&str>, http_path: Option<&str>) -> Self {
        let name = name.map_or_else(|| service_name(type_name), str::to_string);
        let http_path = http_path.map_or_else(
            || format!("/{}", name.to_lowercase().replace('_', "-")),
            str::to_string,
        );
        Self { name, http_path }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_path(&self) -> &str {
        &self.http_path
    }
}

/// Something requests can be dispatched to by method name: a service bound to an instance, or
/// a stub forwarding to a remote service.
#[async_trait]
pub trait ServiceEndpoint: Send + Sync {
    fn name(&self) -> &str;

    fn rpcs(&self) -> Vec<Arc<Rpc>>;

    async fn invoke(
        &self,
        method: &str,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError>;
}

/// Sends a request for a method to wherever it is implemented.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        rpc: &Rpc,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError>;
}

struct Naming {
    type_name: String,
    name: Option<String>,
    http_path: Option<String>,
}

impl Naming {
    fn info(&self) -> ServiceInfo {
        ServiceInfo::new(
            &self.type_name,
            self.name.as_deref(),
            self.http_path.as_deref(),
        )
    }
}

/// Declares the methods of a service whose instances are of type `S`.
///
/// ```ignore
/// let service = ServiceBuilder::<PetStore>::new("PetService")
///     .method("get_pet", MethodDescriptor::handler(signature, handler(get_pet)).get("./{id}"))
///     .build()?;
/// ```
pub struct ServiceBuilder<S> {
    naming: Naming,
    converters: Vec<Arc<dyn Converter>>,
    stub: Option<Arc<Stub>>,
    validator: Option<Arc<MessageValidator>>,
    methods: Vec<(String, MethodDescriptor<S>)>,
}

impl<S: Send + Sync + 'static> ServiceBuilder<S> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            naming: Naming {
                type_name: type_name.into(),
                name: None,
                http_path: None,
            },
            converters: vec![],
            stub: None,
            validator: None,
            methods: vec![],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.naming.name = Some(name.into());
        self
    }

    pub fn with_http_path(mut self, http_path: impl Into<String>) -> Self {
        self.naming.http_path = Some(http_path.into());
        self
    }

    /// Tried after the method's own converters and before the well-known ones.
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_stub(mut self, stub: Arc<Stub>) -> Self {
        self.stub = Some(stub);
        self
    }

    /// Share a validator (and its compiled cache) between services.
    pub fn with_validator(mut self, validator: Arc<MessageValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn method(mut self, attribute: impl Into<String>, descriptor: MethodDescriptor<S>) -> Self {
        self.methods.push((attribute.into(), descriptor));
        self
    }

    pub fn build(self) -> Result<Service<S>, BindingError> {
        let info = self.naming.info();
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(MessageValidator::new()));
        let converters: Vec<_> = self
            .converters
            .into_iter()
            .chain(default_converters())
            .collect();
        let stub = self.stub;

        let mut methods = IndexMap::new();
        for (attribute, descriptor) in self.methods {
            let name = descriptor.method_name(&attribute);
            if methods.contains_key(&name) {
                return Err(BindingError::DuplicateMethod {
                    service: info.name().to_string(),
                    method: name,
                });
            }

            let declared_by_stub = stub.as_ref().and_then(|stub| stub.rpc(&name));
            let method = descriptor.prepare(
                &info,
                &attribute,
                declared_by_stub.map(|rpc| rpc.as_ref()),
                &converters,
                validator.clone(),
            )?;
            methods.insert(name, Arc::new(method));
        }

        if let Some(stub) = &stub {
            for rpc in stub.rpcs.values() {
                if !methods.contains_key(rpc.name()) {
                    methods.insert(
                        rpc.name().to_string(),
                        Arc::new(Method::unimplemented(rpc.clone(), validator.clone())),
                    );
                }
            }
        }

        for method in methods.values() {
            let rpc = method.rpc();
            tracing::info!(
                service = info.name(),
                method = rpc.name(),
                verb = %rpc.http_verb(),
                path = rpc.http_path(),
                implemented = method.is_implemented(),
                "Registered method"
            );
        }

        Ok(Service { info, methods })
    }
}

/// A prepared, immutable set of methods.
pub struct Service<S> {
    info: ServiceInfo,
    methods: IndexMap<String, Arc<Method<S>>>,
}

impl<S: Send + Sync + 'static> Service<S> {
    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn http_path(&self) -> &str {
        self.info.http_path()
    }

    pub fn method(&self, name: &str) -> Option<&Arc<Method<S>>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<Method<S>>> {
        self.methods.values()
    }

    pub async fn invoke(
        &self,
        instance: Arc<S>,
        method: &str,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError> {
        let method = self.method(method).ok_or_else(|| {
            RpcError::not_found(format!("Service '{}' has no method '{method}'", self.name()))
        })?;
        method.invoke(instance, request, context).await
    }

    pub fn bind(self, instance: impl Into<Arc<S>>) -> BoundService<S> {
        BoundService {
            service: Arc::new(self),
            instance: instance.into(),
        }
    }
}

/// A service paired with the instance its handlers run against.
pub struct BoundService<S> {
    service: Arc<Service<S>>,
    instance: Arc<S>,
}

impl<S> Clone for BoundService<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            instance: self.instance.clone(),
        }
    }
}

impl<S: Send + Sync + 'static> BoundService<S> {
    pub fn service(&self) -> &Service<S> {
        &self.service
    }

    pub fn instance(&self) -> &Arc<S> {
        &self.instance
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> ServiceEndpoint for BoundService<S> {
    fn name(&self) -> &str {
        self.service.name()
    }

    fn rpcs(&self) -> Vec<Arc<Rpc>> {
        self.service
            .methods()
            .map(|method| method.rpc().clone())
            .collect()
    }

    async fn invoke(
        &self,
        method: &str,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError> {
        self.service
            .invoke(self.instance.clone(), method, request, context)
            .await
    }
}

/// Declares the interface of a service without implementing it.
///
/// Handlers given to stub methods are ignored; their signatures are only used to infer the
/// message types.
pub struct StubBuilder {
    naming: Naming,
    converters: Vec<Arc<dyn Converter>>,
    methods: Vec<(String, MethodDescriptor<()>)>,
}

impl StubBuilder {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            naming: Naming {
                type_name: type_name.into(),
                name: None,
                http_path: None,
            },
            converters: vec![],
            methods: vec![],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.naming.name = Some(name.into());
        self
    }

    pub fn with_http_path(mut self, http_path: impl Into<String>) -> Self {
        self.naming.http_path = Some(http_path.into());
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn method(mut self, attribute: impl Into<String>, descriptor: MethodDescriptor<()>) -> Self {
        self.methods.push((attribute.into(), descriptor));
        self
    }

    pub fn build(self) -> Result<Stub, BindingError> {
        let info = self.naming.info();
        let converters: Vec<_> = self
            .converters
            .into_iter()
            .chain(default_converters())
            .collect();
        let validator = Arc::new(MessageValidator::new());

        let mut rpcs = IndexMap::new();
        for (attribute, descriptor) in self.methods {
            let name = descriptor.method_name(&attribute);
            if rpcs.contains_key(&name) {
                return Err(BindingError::DuplicateMethod {
                    service: info.name().to_string(),
                    method: name,
                });
            }
            let method =
                descriptor.prepare(&info, &attribute, None, &converters, validator.clone())?;
            rpcs.insert(name, method.rpc().clone());
        }

        tracing::debug!(stub = info.name(), methods = rpcs.len(), "Built stub");

        Ok(Stub {
            info,
            rpcs,
            client: None,
        })
    }
}

/// The interface of a (possibly remote) service: method contracts plus an optional transport
/// that invocations are forwarded to.
#[derive(Clone)]
pub struct Stub {
    info: ServiceInfo,
    rpcs: IndexMap<String, Arc<Rpc>>,
    client: Option<Arc<dyn RpcTransport>>,
}

impl Stub {
    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    pub fn rpc(&self, name: &str) -> Option<&Arc<Rpc>> {
        self.rpcs.get(name)
    }

    pub fn with_client(mut self, client: Arc<dyn RpcTransport>) -> Self {
        self.client = Some(client);
        self
    }
}

#[async_trait]
impl ServiceEndpoint for Stub {
    fn name(&self) -> &str {
        self.info.name()
    }

    fn rpcs(&self) -> Vec<Arc<Rpc>> {
        self.rpcs.values().cloned().collect()
    }

    async fn invoke(
        &self,
        method: &str,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError> {
        let rpc = self.rpc(method).ok_or_else(|| {
            RpcError::not_found(format!("Stub '{}' has no method '{method}'", self.info.name()))
        })?;

        match &self.client {
            Some(client) => client.call(rpc, request, context).await,
            None => Err(RpcError::not_implemented(format!(
                "'{}.{}' is not implemented",
                self.info.name(),
                rpc.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arguments::{Arguments, handler},
        method::HttpVerb,
        signature::Signature,
    };
    use common::error::ErrorKind;
    use http::StatusCode;
    use message_model::{FieldSpec, MessageType, Value, well_known};

    #[test]
    fn default_names() {
        assert_eq!(service_name("PetService"), "pet");
        assert_eq!(service_name("InventoryRemote"), "inventory");
        assert_eq!(service_name("GreeterStub"), "greeter");
        assert_eq!(service_name("Greeter"), "greeter");

        let info = ServiceInfo::new("Pet_StoreService", None, None);
        assert_eq!(info.name(), "pet_store");
        assert_eq!(info.http_path(), "/pet-store");

        let info = ServiceInfo::new("PetService", Some("animals"), Some("/v1/animals"));
        assert_eq!(info.name(), "animals");
        assert_eq!(info.http_path(), "/v1/animals");
    }

    fn pet() -> MessageType {
        MessageType::builder("Pet")
            .field(FieldSpec::int64("id"))
            .field(FieldSpec::string("name"))
            .build()
            .unwrap()
    }

    fn pet_stub(pet: &MessageType) -> Stub {
        StubBuilder::new("PetStub")
            .method(
                "get_pet",
                MethodDescriptor::new()
                    .with_request(pet)
                    .with_response(pet)
                    .get("./{id}"),
            )
            .method(
                "delete_pet",
                MethodDescriptor::new()
                    .with_request(pet)
                    .delete("./{id}"),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn stubs_declare_contracts() {
        let pet = pet();
        let stub = pet_stub(&pet);

        let get = stub.rpc("get_pet").unwrap();
        assert_eq!(get.http_verb(), HttpVerb::Get);
        assert_eq!(get.http_path(), "/pet/{id}");
        assert_eq!(get.http_status(), StatusCode::OK);

        let delete = stub.rpc("delete_pet").unwrap();
        assert_eq!(delete.http_status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn stubs_without_a_client_are_not_implemented() {
        let pet = pet();
        let stub = pet_stub(&pet);

        let error = stub
            .invoke("get_pet", Message::new(&pet), CallContext::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotImplemented);

        let error = stub
            .invoke("feed_pet", Message::new(&pet), CallContext::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    struct Echo;

    #[async_trait]
    impl RpcTransport for Echo {
        async fn call(
            &self,
            _rpc: &Rpc,
            request: Message,
            _context: CallContext,
        ) -> Result<Message, RpcError> {
            Ok(request)
        }
    }

    #[tokio::test]
    async fn stubs_forward_to_their_client() {
        let pet = pet();
        let stub = pet_stub(&pet).with_client(Arc::new(Echo));
        let request = Message::from_fields(&pet, [("id", 7)]).unwrap();

        let response = stub
            .invoke("get_pet", request.clone(), CallContext::new())
            .await
            .unwrap();
        assert_eq!(response, request);
    }

    struct PetStore {
        name: String,
    }

    static PET: std::sync::LazyLock<MessageType> = std::sync::LazyLock::new(pet);

    #[tokio::test]
    async fn services_inherit_from_their_stub() {
        let pet = PET.clone();
        let stub = Arc::new(pet_stub(&pet));

        let service = ServiceBuilder::<PetStore>::new("PetService")
            .with_stub(stub)
            .method(
                "get_pet",
                MethodDescriptor::handler(
                    Signature::new().required("id", message_model::NativeType::Int64),
                    handler(|store: Arc<PetStore>, args: Arguments, _| async move {
                        let pet = Message::from_fields(
                            &PET,
                            [
                                ("id", Value::from(args.get_i64("id").unwrap_or_default())),
                                ("name", Value::from(store.name.as_str())),
                            ],
                        )
                        .map_err(|e| RpcError::server_error(e.to_string()))?;
                        Ok::<_, RpcError>(Value::Message(pet))
                    }),
                )
                .get("./{id}"),
            )
            .build()
            .unwrap();

        // Messages come from the stub, and the unimplemented method is inherited
        let get = service.method("get_pet").unwrap();
        assert_eq!(get.rpc().request(), &pet);
        assert_eq!(get.rpc().response(), &pet);
        assert!(!service.method("delete_pet").unwrap().is_implemented());

        let bound = service.bind(PetStore {
            name: "rex".to_string(),
        });
        let request = Message::from_fields(&pet, [("id", 3)]).unwrap();
        let response = bound
            .invoke("get_pet", request, CallContext::new())
            .await
            .unwrap();
        assert_eq!(response.get("name").unwrap(), Value::from("rex"));
        assert_eq!(response.get("id").unwrap(), Value::from(3));

        let error = bound
            .invoke("delete_pet", Message::new(&pet), CallContext::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotImplemented);
    }

    #[test]
    fn duplicate_methods_fail() {
        let result = ServiceBuilder::<()>::new("PingService")
            .method("ping", MethodDescriptor::new())
            .method("other", MethodDescriptor::new().with_name("ping"))
            .build();

        assert!(matches!(
            result,
            Err(BindingError::DuplicateMethod { method, .. }) if method == "ping"
        ));
    }

    #[test]
    fn binding_errors_surface_at_registration() {
        let result = ServiceBuilder::<()>::new("GreeterService")
            .method(
                "greet",
                MethodDescriptor::declare(
                    Signature::new().required("name", message_model::NativeType::String),
                ),
            )
            .build();

        assert!(matches!(result, Err(BindingError::MissingRequest { .. })));

        let ping = ServiceBuilder::<()>::new("PingService")
            .method("ping", MethodDescriptor::declare(Signature::new()))
            .build()
            .unwrap();
        assert!(well_known::is_empty_type(
            ping.method("ping").unwrap().rpc().request()
        ));
    }
}
