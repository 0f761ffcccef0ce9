// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Derives the request and response message types of a handler from its [`Signature`].
//!
//! Request inference, in order of precedence:
//!
//! 1. No parameters: the request is the declared one (or `Empty`) and is not passed on.
//! 2. A leading `request` parameter of a message type receives the whole request. Any other
//!    parameter must have a default.
//! 3. A leading `request` parameter of a native type, with a declared request message,
//!    receives the request through a converter.
//! 4. Otherwise the parameters are unpacked from the request fields. Without a declared
//!    request, a `<MethodName>Request` message is generated from the parameters when
//!    auto-generation is enabled.
//!
//! The response is the declared message, the returned message type, or the wire type of a
//! converter for the returned native type. Values returned for an `Empty` response are
//! discarded.

use std::sync::Arc;

use common::error::RpcError;
use heck::ToUpperCamelCase;
use message_model::{
    Converter, FieldKind, FieldSpec, Message, MessageType, NativeType, ScalarType, Value,
    converter::find_converter, well_known,
};

use crate::{
    arguments::Arguments,
    error::BindingError,
    signature::{Param, ReturnType, Signature},
};

const REQUEST_PARAM: &str = "request";

pub struct BindOptions<'a> {
    pub method: &'a str,
    pub request: Option<&'a MessageType>,
    pub response: Option<&'a MessageType>,
    pub converters: &'a [Arc<dyn Converter>],
    /// Native types of the method's resolvers, bound in order to the leading parameters
    pub resolvers: &'a [NativeType],
    pub auto_generate: bool,
}

#[derive(Debug, Clone)]
enum RequestMode {
    Whole,
    Convert(Arc<dyn Converter>),
    Unpack { params: Vec<UnpackParam>, whole: bool },
    Discard,
}

#[derive(Debug, Clone)]
struct UnpackParam {
    name: String,
    /// Used when the field is absent; `None` falls back to the field's own default
    default: Option<Value>,
}

#[derive(Debug, Clone)]
enum ResponseMode {
    Message,
    Convert(Arc<dyn Converter>),
    Discard,
}

/// The outcome of binding a handler: its message types plus the recipe for turning a request
/// into handler arguments and a returned value into a response.
#[derive(Debug, Clone)]
pub struct Binding {
    method: String,
    request: MessageType,
    response: MessageType,
    request_mode: RequestMode,
    response_mode: ResponseMode,
    resolver_params: Vec<String>,
    /// Parameters filled with their declared default on every call
    defaults: Vec<(String, Value)>,
}

impl Binding {
    pub fn request(&self) -> &MessageType {
        &self.request
    }

    pub fn response(&self) -> &MessageType {
        &self.response
    }

    pub fn resolver_params(&self) -> &[String] {
        &self.resolver_params
    }

    /// Whether every request field is unpacked into its own argument.
    pub fn unpacks_whole_request(&self) -> bool {
        matches!(self.request_mode, RequestMode::Unpack { whole: true, .. })
    }

    pub fn discards_request(&self) -> bool {
        matches!(self.request_mode, RequestMode::Discard)
    }

    pub fn discards_response(&self) -> bool {
        matches!(self.response_mode, ResponseMode::Discard)
    }

    pub fn arguments(&self, request: &Message) -> Result<Arguments, RpcError> {
        let mut arguments = Arguments::new();

        match &self.request_mode {
            RequestMode::Whole => arguments.insert(REQUEST_PARAM, Value::Message(request.clone())),
            RequestMode::Convert(converter) => {
                let value = converter
                    .resolve(request)
                    .map_err(|e| RpcError::bad_request(e.to_string()))?;
                arguments.insert(REQUEST_PARAM, value);
            }
            RequestMode::Unpack { params, .. } => {
                for param in params {
                    let value = match (request.get_present(&param.name), &param.default) {
                        (Some(value), _) => value.clone(),
                        (None, Some(default)) => default.clone(),
                        (None, None) => request
                            .get(&param.name)
                            .map_err(|e| RpcError::server_error(e.to_string()))?,
                    };
                    arguments.insert(&param.name, value);
                }
            }
            RequestMode::Discard => {}
        }

        for (name, value) in &self.defaults {
            arguments.insert(name, value.clone());
        }

        Ok(arguments)
    }

    pub fn response_message(&self, value: Value) -> Result<Message, RpcError> {
        match &self.response_mode {
            ResponseMode::Message => match value {
                Value::Message(message) if message.message_type() == &self.response => Ok(message),
                Value::Null => Ok(Message::new(&self.response)),
                other => Err(RpcError::server_error(format!(
                    "'{}' returned {}, expected a '{}' message",
                    self.method,
                    other.type_name(),
                    self.response.name()
                ))),
            },
            ResponseMode::Convert(converter) => converter
                .format(&value)
                .map_err(|e| RpcError::server_error(e.to_string())),
            ResponseMode::Discard => Ok(Message::new(&self.response)),
        }
    }
}

pub fn bind(signature: &Signature, options: &BindOptions) -> Result<Binding, BindingError> {
    let method = options.method;

    let (resolver_params, params) = split_resolver_params(signature.params(), options)?;

    let (request, request_mode, defaults) = bind_request(params, options)?;
    let (response, response_mode) = bind_response(signature.return_type(), options)?;

    let response_mode = if well_known::is_empty_type(&response) {
        ResponseMode::Discard
    } else {
        response_mode
    };

    tracing::debug!(
        method,
        request = request.name(),
        response = response.name(),
        "Bound handler"
    );

    Ok(Binding {
        method: method.to_string(),
        request,
        response,
        request_mode,
        response_mode,
        resolver_params,
        defaults,
    })
}

fn split_resolver_params<'p>(
    params: &'p [Param],
    options: &BindOptions,
) -> Result<(Vec<String>, &'p [Param]), BindingError> {
    let count = options.resolvers.len();
    if params.len() < count {
        return Err(BindingError::MissingResolverParameter {
            method: options.method.to_string(),
            expected: count,
            actual: params.len(),
        });
    }

    let (resolved, rest) = params.split_at(count);
    for (param, native) in resolved.iter().zip(options.resolvers) {
        if !param.native().is_compatible(native) {
            return Err(BindingError::ResolverMismatch {
                method: options.method.to_string(),
                name: param.name().to_string(),
                expected: native.to_string(),
                actual: param.native().to_string(),
            });
        }
    }

    Ok((
        resolved.iter().map(|param| param.name().to_string()).collect(),
        rest,
    ))
}

type RequestBinding = (MessageType, RequestMode, Vec<(String, Value)>);

fn bind_request(params: &[Param], options: &BindOptions) -> Result<RequestBinding, BindingError> {
    let method = options.method;

    let Some(first) = params.first() else {
        let request = options.request.cloned().unwrap_or_else(well_known::empty);
        return Ok((request, RequestMode::Discard, vec![]));
    };

    if first.name() == REQUEST_PARAM {
        match (first.native(), options.request) {
            (NativeType::Message(declared), request) => {
                if let Some(request) = request
                    && request != declared
                {
                    return Err(BindingError::BadArgument {
                        method: method.to_string(),
                        name: REQUEST_PARAM.to_string(),
                        expected: request.name().to_string(),
                        actual: declared.name().to_string(),
                    });
                }
                let defaults = trailing_defaults(&params[1..], method)?;
                return Ok((declared.clone(), RequestMode::Whole, defaults));
            }
            (NativeType::Any, Some(request)) => {
                let defaults = trailing_defaults(&params[1..], method)?;
                return Ok((request.clone(), RequestMode::Whole, defaults));
            }
            (native, Some(request)) => {
                let converter = find_converter(options.converters, native, Some(request))
                    .ok_or_else(|| BindingError::NoRequestConverter {
                        method: method.to_string(),
                        native: native.to_string(),
                        wire: request.name().to_string(),
                    })?;
                let defaults = trailing_defaults(&params[1..], method)?;
                return Ok((
                    request.clone(),
                    RequestMode::Convert(converter.clone()),
                    defaults,
                ));
            }
            // A native `request` parameter without a declared message is unpacked like any other
            (_, None) => {}
        }
    }

    match options.request {
        Some(request) => unpack_declared(params, request, method),
        None if options.auto_generate => {
            let request = generate_request(params, options)?;
            let params = params
                .iter()
                .map(|param| UnpackParam {
                    name: param.name().to_string(),
                    default: None,
                })
                .collect();
            Ok((
                request,
                RequestMode::Unpack {
                    params,
                    whole: true,
                },
                vec![],
            ))
        }
        None => Err(BindingError::MissingRequest {
            method: method.to_string(),
        }),
    }
}

/// Parameters after a whole-request parameter never come from the request; they must have
/// defaults.
fn trailing_defaults(params: &[Param], method: &str) -> Result<Vec<(String, Value)>, BindingError> {
    params
        .iter()
        .map(|param| match param.default() {
            Some(default) => Ok((param.name().to_string(), default.clone())),
            None => Err(BindingError::UnexpectedRequiredArgument {
                method: method.to_string(),
                name: param.name().to_string(),
            }),
        })
        .collect()
}

fn unpack_declared(
    params: &[Param],
    request: &MessageType,
    method: &str,
) -> Result<RequestBinding, BindingError> {
    let mut unpacked = vec![];
    let mut defaults = vec![];

    for param in params {
        let Some(field) = request.field(param.name()) else {
            match param.default() {
                Some(default) => {
                    defaults.push((param.name().to_string(), default.clone()));
                    continue;
                }
                None => {
                    return Err(BindingError::NotAField {
                        method: method.to_string(),
                        name: param.name().to_string(),
                        message: request.name().to_string(),
                    });
                }
            }
        };

        let field_type = field.native_type();
        if !param.native().is_compatible(&field_type) {
            return Err(BindingError::BadArgument {
                method: method.to_string(),
                name: param.name().to_string(),
                expected: field_type.to_string(),
                actual: param.native().to_string(),
            });
        }

        unpacked.push(param);
    }

    let whole = unpacked.len() == request.field_count();
    let params = unpacked
        .into_iter()
        .map(|param| UnpackParam {
            name: param.name().to_string(),
            default: if whole { None } else { param.default().cloned() },
        })
        .collect();

    Ok((request.clone(), RequestMode::Unpack { params, whole }, defaults))
}

fn generate_request(params: &[Param], options: &BindOptions) -> Result<MessageType, BindingError> {
    let name = format!("{}Request", options.method.to_upper_camel_case());

    let fields = params
        .iter()
        .map(|param| {
            let kind = field_kind(param.native(), options.converters).ok_or_else(|| {
                BindingError::UnsupportedParameterType {
                    method: options.method.to_string(),
                    name: param.name().to_string(),
                    native: param.native().to_string(),
                }
            })?;
            let spec = FieldSpec::new(param.name(), kind);
            Ok(match param.default() {
                Some(default) => spec.with_default(default.clone()),
                None => spec,
            })
        })
        .collect::<Result<Vec<_>, BindingError>>()?;

    Ok(MessageType::builder(name).fields(fields).build()?)
}

fn field_kind(native: &NativeType, converters: &[Arc<dyn Converter>]) -> Option<FieldKind> {
    let scalar = |scalar| Some(FieldKind::Scalar(scalar));

    match native {
        NativeType::Bool => scalar(ScalarType::Bool),
        NativeType::Int32 => scalar(ScalarType::Int32),
        NativeType::Int64 => scalar(ScalarType::Int64),
        NativeType::Float32 => scalar(ScalarType::Float32),
        NativeType::Float64 => scalar(ScalarType::Float64),
        NativeType::String => scalar(ScalarType::String),
        NativeType::Bytes => scalar(ScalarType::Bytes),
        NativeType::Message(message_type) => Some(FieldKind::message(message_type)),
        NativeType::List(item) => field_kind(item, converters).map(FieldKind::repeated),
        NativeType::Map(value) => field_kind(value, converters).map(FieldKind::map),
        NativeType::Date | NativeType::DateTime | NativeType::Named(_) | NativeType::Any => {
            find_converter(converters, native, None)
                .map(|converter| FieldKind::converter(converter.clone()))
        }
    }
}

fn bind_response(
    returns: &ReturnType,
    options: &BindOptions,
) -> Result<(MessageType, ResponseMode), BindingError> {
    let method = options.method;

    let converted = |native: &NativeType, wire: Option<&MessageType>| {
        find_converter(options.converters, native, wire)
            .map(|converter| (converter.wire().clone(), ResponseMode::Convert(converter.clone())))
            .ok_or_else(|| BindingError::NoResponseConverter {
                method: method.to_string(),
                native: native.to_string(),
            })
    };

    match (options.response, returns) {
        (None, ReturnType::None | ReturnType::Unannotated) => {
            Ok((well_known::empty(), ResponseMode::Discard))
        }
        (None, ReturnType::Message(message_type)) => {
            Ok((message_type.clone(), ResponseMode::Message))
        }
        (None, ReturnType::Native(native)) => converted(native, None),

        (Some(response), ReturnType::Unannotated) => Ok((response.clone(), ResponseMode::Message)),
        // Nothing comes back, so the declared response gives way to Empty
        (Some(_), ReturnType::None) => Ok((well_known::empty(), ResponseMode::Discard)),
        (Some(response), ReturnType::Message(message_type)) if message_type == response => {
            Ok((response.clone(), ResponseMode::Message))
        }
        (Some(response), ReturnType::Message(message_type)) => {
            converted(&NativeType::Message(message_type.clone()), Some(response))
        }
        (Some(response), ReturnType::Native(NativeType::Any)) => {
            Ok((response.clone(), ResponseMode::Message))
        }
        (Some(response), ReturnType::Native(native)) => converted(native, Some(response)),
    }
}
