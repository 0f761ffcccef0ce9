// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{
    any::Any,
    collections::HashSet,
    fmt::Display,
    panic::AssertUnwindSafe,
    sync::{Arc, LazyLock},
};

use common::error::RpcError;
use futures::{FutureExt, future::try_join_all};
use http::StatusCode;
use message_model::{Converter, FieldDescriptor, Message, MessageType, well_known};
use message_validation::MessageValidator;
use regex::{Captures, Regex};

use crate::{
    arguments::HandlerFn,
    context::CallContext,
    error::BindingError,
    inspection::{BindOptions, Binding, bind},
    resolver::Resolver,
    service::ServiceInfo,
    signature::Signature,
};

static PATH_PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^}:]+)(:[^}]*)?\}").expect("path parameter pattern is valid")
});

static PATH_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("path part pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn to_method(self) -> http::Method {
        match self {
            HttpVerb::Get => http::Method::GET,
            HttpVerb::Put => http::Method::PUT,
            HttpVerb::Post => http::Method::POST,
            HttpVerb::Patch => http::Method::PATCH,
            HttpVerb::Delete => http::Method::DELETE,
        }
    }

    pub fn from_method(method: &http::Method) -> Option<Self> {
        [
            HttpVerb::Get,
            HttpVerb::Put,
            HttpVerb::Post,
            HttpVerb::Patch,
            HttpVerb::Delete,
        ]
        .into_iter()
        .find(|verb| verb.to_method() == *method)
    }

    /// Whether request fields outside the path travel in the body (rather than the query).
    pub fn has_body(self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Patch | HttpVerb::Put)
    }
}

impl Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_method())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpFieldLocation {
    /// Never assigned by the default partition
    Header,
    Query,
    Path,
    Body,
}

/// Request field names by where they travel in an HTTP request, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpFieldLocations {
    header: Vec<String>,
    query: Vec<String>,
    path: Vec<String>,
    body: Vec<String>,
}

impl HttpFieldLocations {
    pub fn get(&self, location: HttpFieldLocation) -> &[String] {
        match location {
            HttpFieldLocation::Header => &self.header,
            HttpFieldLocation::Query => &self.query,
            HttpFieldLocation::Path => &self.path,
            HttpFieldLocation::Body => &self.body,
        }
    }

    fn partition(request: &MessageType, path_parameters: &[String], verb: HttpVerb) -> Self {
        let mut locations = Self::default();
        for field in request.fields() {
            let name = field.name().to_string();
            if path_parameters.contains(&name) {
                locations.path.push(name);
            } else if verb.has_body() {
                locations.body.push(name);
            } else {
                locations.query.push(name);
            }
        }
        locations
    }
}

/// HTTP options of a declared method. Unset options take their defaults when the method is
/// prepared.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub verb: Option<HttpVerb>,
    /// A template such as `./{id}`; a leading `.` stands for the service path
    pub path: Option<String>,
    pub status: Option<StatusCode>,
}

/// The prepared contract of a method: its message types and HTTP mapping. Shared by servers
/// and clients.
#[derive(Debug, Clone)]
pub struct Rpc {
    name: String,
    service: String,
    request: MessageType,
    response: MessageType,
    http_verb: HttpVerb,
    http_path: String,
    http_status: StatusCode,
    field_locations: HttpFieldLocations,
}

impl Rpc {
    pub(crate) fn prepare(
        service: &ServiceInfo,
        name: &str,
        request: MessageType,
        response: MessageType,
        http: &HttpOptions,
    ) -> Self {
        let http_verb = http.verb.unwrap_or(HttpVerb::Post);
        let http_path = resolve_http_path(http.path.as_deref(), name, service.http_path());
        let http_status = http.status.unwrap_or(if well_known::is_empty_type(&response) {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::OK
        });
        let field_locations =
            HttpFieldLocations::partition(&request, &path_parameters(&http_path), http_verb);

        Self {
            name: name.to_string(),
            service: service.name().to_string(),
            request,
            response,
            http_verb,
            http_path,
            http_status,
            field_locations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn request(&self) -> &MessageType {
        &self.request
    }

    pub fn response(&self) -> &MessageType {
        &self.response
    }

    pub fn http_verb(&self) -> HttpVerb {
        self.http_verb
    }

    pub fn http_path(&self) -> &str {
        &self.http_path
    }

    pub fn http_status(&self) -> StatusCode {
        self.http_status
    }

    /// Rewrite each `{field}` placeholder of the path template. A placeholder becomes
    /// `before + name + after` (the name is the JSON name when `json_names` is set), or whatever
    /// `hook` returns for the field. Placeholders that name no request field are kept as is.
    pub fn format_http_path(
        &self,
        json_names: bool,
        before: &str,
        after: &str,
        hook: Option<&dyn Fn(&FieldDescriptor, &str) -> String>,
    ) -> String {
        PATH_PART
            .replace_all(&self.http_path, |captures: &Captures| {
                let part = &captures[1];
                let name = part.split_once(':').map_or(part, |(name, _)| name);

                match self.request.field(name) {
                    Some(field) => {
                        let name = if json_names {
                            field.json_name()
                        } else {
                            field.name()
                        };
                        match hook {
                            Some(hook) => hook(field, name),
                            None => format!("{before}{name}{after}"),
                        }
                    }
                    None => captures[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Placeholder names in the path template, in order of appearance.
    pub fn http_path_parameters(&self) -> Vec<String> {
        path_parameters(&self.http_path)
    }

    pub fn http_field_locations(&self) -> &HttpFieldLocations {
        &self.field_locations
    }
}

fn path_parameters(path: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PATH_PARAMETER
        .captures_iter(path)
        .map(|captures| captures[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn resolve_http_path(template: Option<&str>, name: &str, service_path: &str) -> String {
    let template = match template {
        None => format!("./{}", name.to_lowercase().replace('_', "-")),
        Some("") => ".".to_string(),
        Some(template) => template.to_string(),
    };

    match template.strip_prefix('.') {
        Some(rest) => {
            let path = format!("{}{}", service_path.trim_end_matches('/'), rest);
            if path.is_empty() { "/".to_string() } else { path }
        }
        None => template,
    }
}

/// A method as declared on a service (or stub), before it is prepared.
pub struct MethodDescriptor<S> {
    name: Option<String>,
    request: Option<MessageType>,
    response: Option<MessageType>,
    signature: Option<Signature>,
    handler: Option<HandlerFn<S>>,
    http: HttpOptions,
    auto_generate: bool,
    converters: Vec<Arc<dyn Converter>>,
    resolvers: Vec<Arc<dyn Resolver<S>>>,
}

impl<S> Default for MethodDescriptor<S> {
    fn default() -> Self {
        Self {
            name: None,
            request: None,
            response: None,
            signature: None,
            handler: None,
            http: HttpOptions::default(),
            auto_generate: false,
            converters: vec![],
            resolvers: vec![],
        }
    }
}

impl<S: Send + Sync + 'static> MethodDescriptor<S> {
    /// A method with no implementation. Unless declared, its messages come from the matching
    /// stub method, or default to `Empty`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A method whose messages are inferred from `signature`, without an implementation.
    pub fn declare(signature: Signature) -> Self {
        Self {
            signature: Some(signature),
            ..Self::default()
        }
    }

    pub fn handler(signature: Signature, handler: HandlerFn<S>) -> Self {
        Self {
            signature: Some(signature),
            handler: Some(handler),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_request(mut self, request: &MessageType) -> Self {
        self.request = Some(request.clone());
        self
    }

    pub fn with_response(mut self, response: &MessageType) -> Self {
        self.response = Some(response.clone());
        self
    }

    pub fn with_http_verb(mut self, verb: HttpVerb) -> Self {
        self.http.verb = Some(verb);
        self
    }

    pub fn with_http_path(mut self, path: impl Into<String>) -> Self {
        self.http.path = Some(path.into());
        self
    }

    pub fn with_http_status(mut self, status: StatusCode) -> Self {
        self.http.status = Some(status);
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.with_http_verb(HttpVerb::Get).with_http_path(path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.with_http_verb(HttpVerb::Put).with_http_path(path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.with_http_verb(HttpVerb::Post).with_http_path(path)
    }

    pub fn patch(self, path: impl Into<String>) -> Self {
        self.with_http_verb(HttpVerb::Patch).with_http_path(path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.with_http_verb(HttpVerb::Delete).with_http_path(path)
    }

    /// Generate a request message from the handler parameters when none is declared.
    pub fn with_auto_generate(mut self, auto_generate: bool) -> Self {
        self.auto_generate = auto_generate;
        self
    }

    /// Converters tried before the service's own.
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver<S>>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub(crate) fn method_name(&self, attribute: &str) -> String {
        self.name.clone().unwrap_or_else(|| attribute.to_string())
    }

    pub(crate) fn prepare(
        self,
        service: &ServiceInfo,
        attribute: &str,
        declared_by_stub: Option<&Rpc>,
        service_converters: &[Arc<dyn Converter>],
        validator: Arc<MessageValidator>,
    ) -> Result<Method<S>, BindingError> {
        let name = self.method_name(attribute);

        let request = self
            .request
            .or_else(|| declared_by_stub.map(|rpc| rpc.request().clone()));
        let response = self
            .response
            .or_else(|| declared_by_stub.map(|rpc| rpc.response().clone()));

        let binding = match &self.signature {
            Some(signature) => {
                let converters: Vec<_> = self
                    .converters
                    .iter()
                    .chain(service_converters)
                    .cloned()
                    .collect();
                let resolvers: Vec<_> = self
                    .resolvers
                    .iter()
                    .map(|resolver| resolver.native())
                    .collect();

                Some(bind(
                    signature,
                    &BindOptions {
                        method: &name,
                        request: request.as_ref(),
                        response: response.as_ref(),
                        converters: &converters,
                        resolvers: &resolvers,
                        auto_generate: self.auto_generate,
                    },
                )?)
            }
            None => None,
        };

        let (request, response) = match &binding {
            Some(binding) => (binding.request().clone(), binding.response().clone()),
            None => (
                request.unwrap_or_else(well_known::empty),
                response.unwrap_or_else(well_known::empty),
            ),
        };

        let rpc = Rpc::prepare(service, &name, request, response, &self.http);

        let implementation = match (binding, self.handler) {
            (Some(binding), Some(handler)) => Some(Implementation {
                binding,
                handler,
                resolvers: self.resolvers,
            }),
            _ => None,
        };

        Ok(Method {
            rpc: Arc::new(rpc),
            implementation,
            validator,
        })
    }
}

struct Implementation<S> {
    binding: Binding,
    handler: HandlerFn<S>,
    resolvers: Vec<Arc<dyn Resolver<S>>>,
}

/// A prepared method of a service with instances of type `S`.
pub struct Method<S> {
    rpc: Arc<Rpc>,
    implementation: Option<Implementation<S>>,
    validator: Arc<MessageValidator>,
}

impl<S: Send + Sync + 'static> Method<S> {
    /// A method without an implementation, for example one inherited from a stub.
    pub(crate) fn unimplemented(rpc: Arc<Rpc>, validator: Arc<MessageValidator>) -> Self {
        Self {
            rpc,
            implementation: None,
            validator,
        }
    }

    pub fn rpc(&self) -> &Arc<Rpc> {
        &self.rpc
    }

    pub fn name(&self) -> &str {
        self.rpc.name()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.implementation
            .as_ref()
            .map(|implementation| &implementation.binding)
    }

    pub fn is_implemented(&self) -> bool {
        self.implementation.is_some()
    }

    /// Validate the request and run the handler.
    ///
    /// Resolvers and the handler stop at the first of: their own completion, cancellation of
    /// the call, or its deadline. A handler panicking with `unimplemented!` or `todo!` fails
    /// with [`common::error::ErrorKind::NotImplemented`]; other panics propagate.
    pub async fn invoke(
        &self,
        service: Arc<S>,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError> {
        if request.message_type() != self.rpc.request() {
            return Err(RpcError::bad_request(format!(
                "'{}' expects a '{}' request, got '{}'",
                self.name(),
                self.rpc.request().name(),
                request.message_type().name()
            )));
        }

        self.validator.validate(&request)?;

        let Some(implementation) = &self.implementation else {
            return Err(self.not_implemented());
        };

        tracing::debug!(
            service = self.rpc.service_name(),
            method = self.name(),
            "Invoking method"
        );

        let call = Self::call(implementation, service, request, context.clone());

        tokio::select! {
            biased;
            cancelled = context.done() => {
                tracing::debug!(method = self.name(), cancelled, "Call stopped before completion");
                Err(if cancelled {
                    RpcError::cancelled()
                } else {
                    RpcError::deadline_exceeded()
                })
            }
            result = AssertUnwindSafe(call).catch_unwind() => match result {
                Ok(result) => result,
                Err(panic) => Err(self.map_panic(panic)),
            },
        }
    }

    async fn call(
        implementation: &Implementation<S>,
        service: Arc<S>,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError> {
        let resolved = try_join_all(
            implementation
                .resolvers
                .iter()
                .map(|resolver| resolver.resolve(&service, &request, &context)),
        )
        .await?;

        let binding = &implementation.binding;
        let mut arguments = binding.arguments(&request)?;
        for (name, value) in binding.resolver_params().iter().zip(resolved) {
            arguments.insert_resolved(name, value);
        }

        let value = (implementation.handler)(service, arguments, context).await?;
        binding.response_message(value)
    }

    fn not_implemented(&self) -> RpcError {
        RpcError::not_implemented(format!(
            "'{}.{}' is not implemented",
            self.rpc.service_name(),
            self.name()
        ))
    }

    fn map_panic(&self, panic: Box<dyn Any + Send>) -> RpcError {
        let message = panic
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned());

        match message {
            Some(message)
                if message.starts_with("not implemented")
                    || message.starts_with("not yet implemented") =>
            {
                self.not_implemented()
            }
            _ => std::panic::resume_unwind(panic),
        }
    }
}
