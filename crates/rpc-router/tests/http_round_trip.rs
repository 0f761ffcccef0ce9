// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use http::StatusCode;
use test_log::test;

use common::{
    env_const::SABLE_HTTP_PATH_PREFIX,
    error::{ErrorKind, ErrorResponse, RpcError},
    http::{MemoryRequest, ResponseBody},
};
use message_codec::JsonProtocol;
use message_model::{FieldKind, FieldSpec, Message, MessageType, NativeType, Schema, Value};
use rpc_core::{
    Arguments, CallContext, MethodDescriptor, ReturnType, ServiceBuilder, ServiceEndpoint,
    Signature, Stub, StubBuilder, handler,
};
use rpc_router::{ClientRequest, ClientResponse, ClientTransport, HttpRpcRouter, RpcClient};
use sable_env::MapEnvironment;

static PET: LazyLock<MessageType> = LazyLock::new(|| {
    MessageType::builder("Pet")
        .field(FieldSpec::int64("id"))
        .field(FieldSpec::string("name").with_schema(Schema::default().with_max_length(8)))
        .field(FieldSpec::repeated(
            "tags",
            FieldKind::Scalar(message_model::ScalarType::String),
        ))
        .build()
        .unwrap()
});

static PET_ID: LazyLock<MessageType> = LazyLock::new(|| {
    MessageType::builder("PetId")
        .field(FieldSpec::int64("id"))
        .build()
        .unwrap()
});

static LIST_PETS: LazyLock<MessageType> = LazyLock::new(|| {
    MessageType::builder("ListPets")
        .field(FieldSpec::string("tag"))
        .build()
        .unwrap()
});

static PET_LIST: LazyLock<MessageType> = LazyLock::new(|| {
    MessageType::builder("PetList")
        .field(FieldSpec::repeated("pets", FieldKind::message(&PET)))
        .build()
        .unwrap()
});

fn pet_stub() -> Stub {
    StubBuilder::new("PetStub")
        .method(
            "get_pet",
            MethodDescriptor::new()
                .with_request(&PET_ID)
                .with_response(&PET)
                .get("./{id}"),
        )
        .method(
            "create_pet",
            MethodDescriptor::new()
                .with_request(&PET)
                .with_response(&PET)
                .post(".")
                .with_http_status(StatusCode::CREATED),
        )
        .method(
            "list_pets",
            MethodDescriptor::new()
                .with_request(&LIST_PETS)
                .with_response(&PET_LIST)
                .get("."),
        )
        .method(
            "delete_pet",
            MethodDescriptor::new()
                .with_request(&PET_ID)
                .delete("./{id}"),
        )
        .method(
            "feed_pet",
            MethodDescriptor::new()
                .with_request(&PET_ID)
                .post("./{id}/feed"),
        )
        .build()
        .unwrap()
}

#[derive(Default)]
struct PetStore {
    pets: Mutex<Vec<Message>>,
}

fn not_found(id: i64) -> RpcError {
    RpcError::not_found(format!("No pet with id {id}"))
}

async fn get_pet(store: Arc<PetStore>, args: Arguments, _: CallContext) -> Result<Value, RpcError> {
    let id = args.get_i64("id").unwrap_or_default();
    let pets = store.pets.lock().unwrap();
    pets.iter()
        .find(|pet| pet.get("id").ok().and_then(|id| id.as_i64()) == Some(id))
        .map(|pet| Value::Message(pet.clone()))
        .ok_or_else(|| not_found(id))
}

async fn create_pet(
    store: Arc<PetStore>,
    args: Arguments,
    _: CallContext,
) -> Result<Value, RpcError> {
    let mut pet = args.request().cloned().unwrap_or_else(|| Message::new(&PET));
    let mut pets = store.pets.lock().unwrap();
    pet.set("id", pets.len() as i64 + 1)
        .map_err(|e| RpcError::server_error(e.to_string()))?;
    pets.push(pet.clone());
    Ok(Value::Message(pet))
}

async fn list_pets(
    store: Arc<PetStore>,
    args: Arguments,
    _: CallContext,
) -> Result<Value, RpcError> {
    let tag = args.get_str("tag").unwrap_or_default();
    let pets = store.pets.lock().unwrap();
    let matching = pets
        .iter()
        .filter(|pet| {
            tag.is_empty()
                || pet.get("tags").ok().is_some_and(|tags| {
                    tags.as_list()
                        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
                })
        })
        .map(|pet| Value::Message(pet.clone()))
        .collect::<Vec<_>>();

    Message::from_fields(&PET_LIST, [("pets", Value::List(matching))])
        .map(Value::Message)
        .map_err(|e| RpcError::server_error(e.to_string()))
}

async fn delete_pet(
    store: Arc<PetStore>,
    args: Arguments,
    _: CallContext,
) -> Result<Value, RpcError> {
    let id = args.get_i64("id").unwrap_or_default();
    let mut pets = store.pets.lock().unwrap();
    let before = pets.len();
    pets.retain(|pet| pet.get("id").ok().and_then(|id| id.as_i64()) != Some(id));
    if pets.len() == before {
        return Err(not_found(id));
    }
    Ok(Value::Null)
}

fn pet_service(stub: Arc<Stub>) -> Arc<dyn ServiceEndpoint> {
    let service = ServiceBuilder::<PetStore>::new("PetService")
        .with_stub(stub)
        .method(
            "get_pet",
            MethodDescriptor::handler(
                Signature::new()
                    .required("id", NativeType::Int64)
                    .returns_message(&PET),
                handler(get_pet),
            )
            .get("./{id}"),
        )
        .method(
            "create_pet",
            MethodDescriptor::handler(
                Signature::new().request(&PET).returns_message(&PET),
                handler(create_pet),
            )
            .post(".")
            .with_http_status(StatusCode::CREATED),
        )
        .method(
            "list_pets",
            MethodDescriptor::handler(
                Signature::new()
                    .optional("tag", NativeType::String, "")
                    .returns_message(&PET_LIST),
                handler(list_pets),
            )
            .get("."),
        )
        .method(
            "delete_pet",
            MethodDescriptor::handler(
                Signature::new()
                    .required("id", NativeType::Int64)
                    .returns(ReturnType::None),
                handler(delete_pet),
            )
            .delete("./{id}"),
        )
        .build()
        .unwrap();

    Arc::new(service.bind(PetStore::default()))
}

async fn greet(_: Arc<()>, args: Arguments, _: CallContext) -> Result<Value, RpcError> {
    Ok(Value::from(format!(
        "hello {}",
        args.get_str("name").unwrap_or_default()
    )))
}

/// A service whose only route is a bare `{name}` placeholder, mounted without a leading slash.
fn rooted_service() -> Arc<dyn ServiceEndpoint> {
    let service = ServiceBuilder::<()>::new("GreeterService")
        .method(
            "greet",
            MethodDescriptor::handler(
                Signature::new()
                    .required("name", NativeType::String)
                    .returns(ReturnType::Native(NativeType::String)),
                handler(greet),
            )
            .with_auto_generate(true)
            .get("{name}"),
        )
        .build()
        .unwrap();

    Arc::new(service.bind(()))
}

fn router(env: &MapEnvironment) -> HttpRpcRouter {
    let mut router = HttpRpcRouter::new(env).unwrap();
    router.add_service(pet_service(Arc::new(pet_stub()))).unwrap();
    router
}

/// Hands requests straight to a router.
struct Loopback {
    router: HttpRpcRouter,
}

#[async_trait]
impl ClientTransport for Loopback {
    async fn send(
        &self,
        request: ClientRequest,
        context: &CallContext,
    ) -> Result<ClientResponse, RpcError> {
        let mut http_request = MemoryRequest::new(request.method.clone(), &request.target());
        for (key, value) in request.headers.clone() {
            http_request = http_request.with_header(&key, &value);
        }
        let mut http_request = http_request.with_body(request.body);

        match self
            .router
            .route_with_context(&mut http_request, context.clone())
            .await
        {
            Some(response) => Ok(ClientResponse {
                status: response.status_code,
                body: response.body.as_bytes().to_vec(),
            }),
            None => Ok(ClientResponse {
                status: StatusCode::NOT_FOUND,
                body: vec![],
            }),
        }
    }
}

fn client_stub() -> Stub {
    let client = RpcClient::new(
        Arc::new(Loopback {
            router: router(&MapEnvironment::new()),
        }),
        Arc::new(JsonProtocol::new()),
    );
    pet_stub().with_client(Arc::new(client))
}

fn pet(name: &str, tags: &[&str]) -> Message {
    Message::from_fields(
        &PET,
        [
            ("name", Value::from(name)),
            (
                "tags",
                Value::List(tags.iter().map(|tag| Value::from(*tag)).collect()),
            ),
        ],
    )
    .unwrap()
}

fn id(id: i64) -> Message {
    Message::from_fields(&PET_ID, [("id", id)]).unwrap()
}

#[test(tokio::test)]
async fn client_and_server_agree() {
    let stub = client_stub();
    let context = CallContext::new();

    let created = stub
        .invoke("create_pet", pet("rex", &["dog"]), context.clone())
        .await
        .unwrap();
    assert_eq!(created.get("id").unwrap(), Value::from(1));
    stub.invoke("create_pet", pet("tom", &["cat"]), context.clone())
        .await
        .unwrap();

    let fetched = stub
        .invoke("get_pet", id(1), context.clone())
        .await
        .unwrap();
    assert_eq!(fetched, created);

    let tag = Message::from_fields(&LIST_PETS, [("tag", "cat")]).unwrap();
    let listed = stub
        .invoke("list_pets", tag, context.clone())
        .await
        .unwrap();
    let names: Vec<_> = listed
        .get("pets")
        .unwrap()
        .as_list()
        .unwrap()
        .iter()
        .map(|pet| pet.as_message().unwrap().get("name").unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("tom")]);

    let deleted = stub
        .invoke("delete_pet", id(1), context.clone())
        .await
        .unwrap();
    assert!(deleted.is_empty());

    let error = stub
        .invoke("get_pet", id(1), context.clone())
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::NotFound);
    assert_eq!(error.description, "No pet with id 1");
}

#[test(tokio::test)]
async fn validation_errors_reach_the_client() {
    let stub = client_stub();

    let error = stub
        .invoke("create_pet", pet("bartholomew", &[]), CallContext::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::Validation);
    assert_eq!(error.path.to_string(), "name");
    assert_eq!(error.description, "'bartholomew' is too long");
}

#[test(tokio::test)]
async fn inherited_methods_are_not_implemented() {
    let error = client_stub()
        .invoke("feed_pet", id(1), CallContext::new())
        .await
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::NotImplemented);
}

#[test]
fn requests_are_split_by_field_location() {
    let client = RpcClient::new(
        Arc::new(Loopback {
            router: router(&MapEnvironment::new()),
        }),
        Arc::new(JsonProtocol::new()),
    )
    .with_base_path("/api");
    let stub = pet_stub();

    let get = client
        .build_request(stub.rpc("get_pet").unwrap(), &id(42))
        .unwrap();
    assert_eq!(get.method, http::Method::GET);
    assert_eq!(get.target(), "/api/pet/42");
    assert!(get.body.is_empty());

    let list = client
        .build_request(
            stub.rpc("list_pets").unwrap(),
            &Message::from_fields(&LIST_PETS, [("tag", "good boy")]).unwrap(),
        )
        .unwrap();
    assert_eq!(list.target(), "/api/pet?tag=good+boy");

    let create = client
        .build_request(stub.rpc("create_pet").unwrap(), &pet("rex", &["dog"]))
        .unwrap();
    assert_eq!(create.method, http::Method::POST);
    assert_eq!(create.target(), "/api/pet");
    assert_eq!(
        String::from_utf8(create.body).unwrap(),
        r#"{"name":"rex","tags":["dog"]}"#
    );
}

#[test(tokio::test)]
async fn malformed_path_parameters_are_rejected() {
    let router = router(&MapEnvironment::new());
    let mut request = MemoryRequest::new(http::Method::GET, "/pet/abc");

    let response = router
        .route_with_context(&mut request, CallContext::new())
        .await
        .unwrap();
    assert_eq!(response.status_code, StatusCode::BAD_REQUEST);

    let ResponseBody::Bytes(body) = response.body else {
        panic!("expected an error body");
    };
    let error = ErrorResponse::from_bytes(400, &body);
    assert_eq!(error.path, "id");
}

#[test(tokio::test)]
async fn unknown_paths_are_declined() {
    let router = router(&MapEnvironment::new());

    let mut request = MemoryRequest::new(http::Method::GET, "/owner/1");
    assert!(
        router
            .route_with_context(&mut request, CallContext::new())
            .await
            .is_none()
    );

    let mut request = MemoryRequest::new(http::Method::PUT, "/pet/1");
    let response = router
        .route_with_context(&mut request, CallContext::new())
        .await
        .unwrap();
    assert_eq!(response.status_code, StatusCode::METHOD_NOT_ALLOWED);
}

#[test(tokio::test)]
async fn routes_are_mounted_below_the_prefix() {
    let env = MapEnvironment::from([(SABLE_HTTP_PATH_PREFIX, "api/")]);
    let router = router(&env);

    let mut request = MemoryRequest::new(http::Method::POST, "/api/pet")
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "rex"}"#);
    let response = router
        .route_with_context(&mut request, CallContext::new())
        .await
        .unwrap();
    assert_eq!(response.status_code, StatusCode::CREATED);

    let mut request = MemoryRequest::new(http::Method::DELETE, "/api/pet/1");
    let response = router
        .route_with_context(&mut request, CallContext::new())
        .await
        .unwrap();
    assert_eq!(response.status_code, StatusCode::NO_CONTENT);
    assert_eq!(response.body, ResponseBody::None);

    for path in ["/pet/1", "/apiary/pet/1", "/api-pet/1"] {
        let mut request = MemoryRequest::new(http::Method::DELETE, path);
        assert!(
            router
                .route_with_context(&mut request, CallContext::new())
                .await
                .is_none(),
            "{path} should not be routed"
        );
    }
}

#[test(tokio::test)]
async fn prefix_ends_at_a_segment_boundary() {
    let env = MapEnvironment::from([(SABLE_HTTP_PATH_PREFIX, "/api")]);
    let mut router = HttpRpcRouter::new(&env).unwrap();
    router.add_service(rooted_service()).unwrap();

    for path in ["/apiary", "/api", "/api/rex"] {
        let mut request = MemoryRequest::new(http::Method::GET, path);
        assert!(
            router
                .route_with_context(&mut request, CallContext::new())
                .await
                .is_none(),
            "{path} should not be routed"
        );
    }

    let mut unprefixed = HttpRpcRouter::with_protocol(Arc::new(JsonProtocol::new()), "");
    unprefixed.add_service(rooted_service()).unwrap();
    let mut request = MemoryRequest::new(http::Method::GET, "ary");
    let response = unprefixed
        .route_with_context(&mut request, CallContext::new())
        .await
        .unwrap();
    assert_eq!(response.status_code, StatusCode::OK);
}

#[test]
fn services_are_registered_once() {
    let mut router = HttpRpcRouter::with_protocol(Arc::new(JsonProtocol::new()), "");
    let service = pet_service(Arc::new(pet_stub()));

    router.add_service(service.clone()).unwrap();
    router.add_service(service).unwrap();
    assert_eq!(router.services().count(), 1);

    assert!(matches!(
        router.add_service(pet_service(Arc::new(pet_stub()))),
        Err(rpc_router::RouterError::DuplicateService(name)) if name == "pet"
    ));
}
