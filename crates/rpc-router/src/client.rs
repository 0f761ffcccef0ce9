// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use http::StatusCode;
use url::form_urlencoded;

use common::{
    error::{ErrorResponse, RpcError},
    http::Headers,
};
use message_codec::{JsonProtocol, Protocol, UriStringProtocol};
use message_model::{FieldDescriptor, Message};
use rpc_core::{CallContext, HttpFieldLocation, Rpc, RpcTransport};

use crate::segment;

/// An HTTP request as built by [`RpcClient`]; `path` is relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub method: http::Method,
    pub path: String,
    /// Form-encoded, without the leading `?`
    pub query: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl ClientRequest {
    /// The path followed by `?query` when there is one.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Carries requests to a server. Transport failures are reported as errors of their own; error
/// responses are returned as responses for [`RpcClient`] to decode.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    async fn send(
        &self,
        request: ClientRequest,
        context: &CallContext,
    ) -> Result<ClientResponse, RpcError>;
}

/// Calls methods of a remote service through a [`ClientTransport`]. Install it on a stub with
/// [`rpc_core::Stub::with_client`] to forward the stub's invocations.
pub struct RpcClient {
    transport: Arc<dyn ClientTransport>,
    json: Arc<JsonProtocol>,
    uri: UriStringProtocol,
    base_path: String,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn ClientTransport>, json: Arc<JsonProtocol>) -> Self {
        Self {
            transport,
            uri: UriStringProtocol::new(json.clone()),
            json,
            base_path: String::new(),
        }
    }

    /// Prefix for every request path, mirroring the server's path prefix.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_string();
        self
    }

    /// Lay out `request` over the path, the query string and the body of an HTTP request.
    pub fn build_request(&self, rpc: &Rpc, request: &Message) -> Result<ClientRequest, RpcError> {
        if request.message_type() != rpc.request() {
            return Err(RpcError::bad_request(format!(
                "'{}' expects a '{}' request, got '{}'",
                rpc.name(),
                rpc.request().name(),
                request.message_type().name()
            )));
        }

        let locations = rpc.http_field_locations();

        let path_values = locations
            .get(HttpFieldLocation::Path)
            .iter()
            .map(|name| {
                let text = self.uri.encode_value(request, name)?;
                Ok((name.clone(), segment::encode(&text)))
            })
            .collect::<Result<HashMap<_, _>, RpcError>>()?;
        let fill = |field: &FieldDescriptor, _: &str| {
            path_values.get(field.name()).cloned().unwrap_or_default()
        };
        let path = format!(
            "{}{}",
            self.base_path,
            rpc.format_http_path(false, "", "", Some(&fill))
        );

        let query_fields = locations.get(HttpFieldLocation::Query);
        let query = if query_fields.is_empty() {
            String::new()
        } else {
            let pairs = self.uri.encode(request, Some(query_fields))?;
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
        };

        let mut headers = Headers::new();
        let body_fields = locations.get(HttpFieldLocation::Body);
        let body = if body_fields.is_empty() {
            vec![]
        } else {
            headers.insert(
                http::header::CONTENT_TYPE.to_string(),
                self.json.mime_type().to_string(),
            );
            self.json.pack_fields(request, body_fields)?
        };

        Ok(ClientRequest {
            method: rpc.http_verb().to_method(),
            path,
            query,
            headers,
            body,
        })
    }

    pub async fn invoke(
        &self,
        rpc: &Rpc,
        request: &Message,
        context: &CallContext,
    ) -> Result<Message, RpcError> {
        let http_request = self.build_request(rpc, request)?;

        tracing::debug!(
            method = %http_request.method,
            target = %http_request.target(),
            "Sending request"
        );

        let response = self.transport.send(http_request, context).await?;

        if !response.status.is_success() {
            let error = RpcError::from(ErrorResponse::from_bytes(
                response.status.as_u16(),
                &response.body,
            ));
            tracing::debug!(status = %response.status, %error, "Received error response");
            return Err(error);
        }

        self.json
            .unpack(rpc.response(), &response.body)
            .map_err(|e| RpcError::server_error(format!("Invalid response: {e}")))
    }
}

#[async_trait]
impl RpcTransport for RpcClient {
    async fn call(
        &self,
        rpc: &Rpc,
        request: Message,
        context: CallContext,
    ) -> Result<Message, RpcError> {
        self.invoke(rpc, &request, &context).await
    }
}
