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
use http::StatusCode;
use indexmap::IndexMap;
use regex::Regex;

use common::{
    env_const::get_http_path_prefix,
    error::RpcError,
    http::{Headers, RequestPayload, ResponseBody, ResponsePayload},
    router::Router,
};
use message_codec::{JsonProtocol, Protocol, UriStringProtocol};
use message_model::Message;
use rpc_core::{CallContext, HttpFieldLocation, HttpVerb, Rpc, ServiceEndpoint};
use sable_env::Environment;

use crate::{error::RouterError, segment};

// Marks placeholders in a formatted path template; cannot appear in a field name
const PLACEHOLDER: char = '\u{1}';

struct Route {
    verb: HttpVerb,
    pattern: Regex,
    /// JSON names of the path fields, in capture-group order
    parameters: Vec<String>,
    rpc: Arc<Rpc>,
    endpoint: Arc<dyn ServiceEndpoint>,
}

impl Route {
    fn new(rpc: Arc<Rpc>, endpoint: Arc<dyn ServiceEndpoint>) -> Result<Self, RouterError> {
        let template = rpc.format_http_path(
            true,
            &PLACEHOLDER.to_string(),
            &PLACEHOLDER.to_string(),
            None,
        );

        let mut pattern = String::from("^");
        let mut parameters = vec![];
        for (index, part) in template.split(PLACEHOLDER).enumerate() {
            if index % 2 == 0 {
                pattern.push_str(&regex::escape(part));
            } else {
                pattern.push_str("([^/]+)");
                parameters.push(part.to_string());
            }
        }
        pattern.push('$');

        let pattern = Regex::new(&pattern).map_err(|e| RouterError::InvalidRoute {
            method: rpc.name().to_string(),
            error: e.to_string(),
        })?;

        Ok(Self {
            verb: rpc.http_verb(),
            pattern,
            parameters,
            rpc,
            endpoint,
        })
    }

    /// Decoded `(json name, value)` pairs when the path matches.
    fn match_path(&self, path: &str) -> Option<Vec<(String, String)>> {
        let captures = self.pattern.captures(path)?;
        Some(
            self.parameters
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, capture)| {
                    capture.map(|capture| (name.clone(), segment::decode(capture.as_str())))
                })
                .collect(),
        )
    }
}

/// Serves the methods of registered services over HTTP.
///
/// A request is routed by verb and path template (below `SABLE_HTTP_PATH_PREFIX`). Its message
/// is assembled from the path parameters, the query string and the JSON body according to the
/// method's field-location partition, then validated and handed to the method. Failures are
/// rendered as `{status, description, path}` with the error's status.
pub struct HttpRpcRouter {
    path_prefix: String,
    json: Arc<JsonProtocol>,
    uri: UriStringProtocol,
    services: IndexMap<String, Arc<dyn ServiceEndpoint>>,
    routes: Vec<Route>,
}

impl HttpRpcRouter {
    pub fn new(env: &dyn Environment) -> Result<Self, RouterError> {
        Ok(Self::with_protocol(
            Arc::new(JsonProtocol::from_env(env)?),
            get_http_path_prefix(env),
        ))
    }

    pub fn with_protocol(json: Arc<JsonProtocol>, path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into().trim_end_matches('/').to_string(),
            uri: UriStringProtocol::new(json.clone()),
            json,
            services: IndexMap::new(),
            routes: vec![],
        }
    }

    /// Register every method of `endpoint`. Registering the same endpoint twice is a no-op.
    pub fn add_service(&mut self, endpoint: Arc<dyn ServiceEndpoint>) -> Result<(), RouterError> {
        let name = endpoint.name().to_string();

        if let Some(existing) = self.services.get(&name) {
            return if Arc::ptr_eq(existing, &endpoint) {
                Ok(())
            } else {
                Err(RouterError::DuplicateService(name))
            };
        }

        let mut routes = vec![];
        for rpc in endpoint.rpcs() {
            let route = Route::new(rpc, endpoint.clone())?;

            if let Some(existing) = self
                .routes
                .iter()
                .chain(routes.iter())
                .find(|existing| {
                    existing.verb == route.verb
                        && existing.pattern.as_str() == route.pattern.as_str()
                })
            {
                return Err(RouterError::DuplicateRoute {
                    verb: route.verb.to_string(),
                    path: route.rpc.http_path().to_string(),
                    existing: format!(
                        "{}.{}",
                        existing.rpc.service_name(),
                        existing.rpc.name()
                    ),
                });
            }

            routes.push(route);
        }

        tracing::info!(service = %name, routes = routes.len(), "Mounted service");

        self.routes.extend(routes);
        self.services.insert(name, endpoint);
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&Arc<dyn ServiceEndpoint>> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &Arc<dyn ServiceEndpoint>> {
        self.services.values()
    }

    /// Route a request with explicit call signals. Returns `None` for paths no method serves.
    pub async fn route_with_context(
        &self,
        request: &mut (dyn RequestPayload + Send + Sync),
        context: CallContext,
    ) -> Option<ResponsePayload> {
        let head = request.get_head();
        let path = head.get_path();
        let path = path
            .strip_prefix(&self.path_prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))?;

        let matching: Vec<_> = self
            .routes
            .iter()
            .filter_map(|route| route.match_path(path).map(|params| (route, params)))
            .collect();

        if matching.is_empty() {
            return None;
        }

        let verb = HttpVerb::from_method(&head.get_method());
        let Some((route, path_params)) = matching
            .into_iter()
            .find(|(route, _)| Some(route.verb) == verb)
        else {
            return Some(ResponsePayload {
                body: ResponseBody::None,
                headers: Headers::new(),
                status_code: StatusCode::METHOD_NOT_ALLOWED,
            });
        };

        let result = match self.decode_request(route, path_params, request) {
            Ok(message) => {
                route
                    .endpoint
                    .invoke(route.rpc.name(), message, context)
                    .await
            }
            Err(error) => Err(error),
        };

        Some(match result.and_then(|response| self.encode_response(route, &response)) {
            Ok(response) => response,
            Err(error) => self.error_response(route, error),
        })
    }

    fn decode_request(
        &self,
        route: &Route,
        path_params: Vec<(String, String)>,
        request: &mut (dyn RequestPayload + Send + Sync),
    ) -> Result<Message, RpcError> {
        let rpc = &route.rpc;
        let locations = rpc.http_field_locations();
        let mut message = Message::new(rpc.request());

        self.uri.decode_into(
            &mut message,
            path_params,
            Some(locations.get(HttpFieldLocation::Path)),
        )?;

        let query_fields = locations.get(HttpFieldLocation::Query);
        if !query_fields.is_empty() {
            let query = request.get_head().get_query();
            self.uri.decode_into(
                &mut message,
                url::form_urlencoded::parse(query.as_bytes()),
                Some(query_fields),
            )?;
        }

        let body_fields = locations.get(HttpFieldLocation::Body);
        if !body_fields.is_empty() {
            let body = request.take_body();
            if !body.is_empty() {
                self.json
                    .unpack_fields_into(&mut message, &body, body_fields)?;
            }
        }

        Ok(message)
    }

    fn encode_response(
        &self,
        route: &Route,
        response: &Message,
    ) -> Result<ResponsePayload, RpcError> {
        let body = self.json.pack(response)?;

        let mut headers = Headers::new();
        let body = if body.is_empty() {
            ResponseBody::None
        } else {
            headers.insert(
                http::header::CONTENT_TYPE.to_string(),
                self.json.mime_type().to_string(),
            );
            ResponseBody::Bytes(body)
        };

        Ok(ResponsePayload {
            body,
            headers,
            status_code: route.rpc.http_status(),
        })
    }

    fn error_response(&self, route: &Route, error: RpcError) -> ResponsePayload {
        let status_code = error.status();
        if status_code.is_server_error() {
            tracing::error!(
                service = route.rpc.service_name(),
                method = route.rpc.name(),
                %error,
                "Request failed"
            );
        } else {
            tracing::warn!(
                service = route.rpc.service_name(),
                method = route.rpc.name(),
                %error,
                path = %error.path,
                "Request rejected"
            );
        }

        let mut headers = Headers::new();
        headers.insert(
            http::header::CONTENT_TYPE.to_string(),
            self.json.mime_type().to_string(),
        );

        ResponsePayload {
            body: ResponseBody::Bytes(error.to_response().to_bytes()),
            headers,
            status_code,
        }
    }
}

#[async_trait]
impl<RQ: Send + Sync> Router<RQ> for HttpRpcRouter {
    async fn route(
        &self,
        request: &mut (dyn RequestPayload + Send + Sync),
        _request_context: &RQ,
    ) -> Option<ResponsePayload> {
        self.route_with_context(request, CallContext::new()).await
    }
}
