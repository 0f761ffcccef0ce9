// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use http::StatusCode;

pub trait RequestPayload {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync);
    fn take_body(&mut self) -> Vec<u8>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn from_vec(vec: Vec<(String, String)>) -> Self {
        let mut headers = vec![];
        for (key, value) in vec {
            headers.push((key.to_lowercase(), value));
        }
        Self { inner: headers }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner
            .iter()
            .find(|(k, _)| k == &key.to_lowercase())
            .map(|(_, v)| v.clone())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        let key = key.to_lowercase();
        self.inner
            .iter()
            .filter(|(k, _)| k == &key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.inner.push((key.to_lowercase(), value));
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.retain(|(k, _)| k != &key.to_lowercase());
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

#[derive(Debug)]
pub struct ResponsePayload {
    pub body: ResponseBody,
    pub headers: Headers,
    pub status_code: StatusCode,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResponseBody {
    Bytes(Vec<u8>),
    None,
}

impl ResponseBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Bytes(bytes) => bytes,
            ResponseBody::None => &[],
        }
    }
}

/// Represents a HTTP request from which information can be extracted
pub trait RequestHead {
    // return all header values that have the following key
    fn get_headers(&self, key: &str) -> Vec<String>;

    // return the first header
    fn get_header(&self, key: &str) -> Option<String> {
        self.get_headers(&key.to_lowercase()).first().cloned()
    }

    fn get_path(&self) -> String;

    // the raw (still percent-encoded) query string, without the leading '?'
    fn get_query(&self) -> String;

    fn get_method(&self) -> http::Method;
}

/// A fully buffered request, for embedding the router without an HTTP server and for tests.
#[derive(Debug, Clone)]
pub struct MemoryRequest {
    head: MemoryRequestHead,
    body: Vec<u8>,
}

#[derive(Debug, Clone)]
struct MemoryRequestHead {
    method: http::Method,
    path: String,
    query: String,
    headers: Headers,
}

impl MemoryRequest {
    /// `target` is a path optionally followed by `?query`.
    pub fn new(method: http::Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.to_string(), String::new()),
        };

        Self {
            head: MemoryRequestHead {
                method,
                path,
                query,
                headers: Headers::new(),
            },
            body: vec![],
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.head.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl RequestHead for MemoryRequestHead {
    fn get_headers(&self, key: &str) -> Vec<String> {
        self.headers.get_all(key)
    }

    fn get_path(&self) -> String {
        self.path.clone()
    }

    fn get_query(&self) -> String {
        self.query.clone()
    }

    fn get_method(&self) -> http::Method {
        self.method.clone()
    }
}

impl RequestPayload for MemoryRequest {
    fn get_head(&self) -> &(dyn RequestHead + Send + Sync) {
        &self.head
    }

    fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }
}

pub fn strip_leading_slash(path: &str) -> String {
    strip_leading(path, "/").to_string()
}

pub fn strip_leading(path: &str, leading: &str) -> String {
    path.strip_prefix(leading).unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_request_splits_target() {
        let mut request = MemoryRequest::new(http::Method::GET, "/pet/12?name=rex")
            .with_header("Content-Type", "application/json")
            .with_body("{}");

        let head = request.get_head();
        assert_eq!(head.get_path(), "/pet/12");
        assert_eq!(head.get_query(), "name=rex");
        assert_eq!(
            head.get_header("content-type").as_deref(),
            Some("application/json")
        );

        assert_eq!(request.take_body(), b"{}".to_vec());
        assert!(request.take_body().is_empty());
    }

    #[test]
    fn headers_are_case_insensitive() {
        let mut headers = Headers::from_vec(vec![("X-Trace".to_string(), "a".to_string())]);
        headers.insert("x-trace".to_string(), "b".to_string());

        assert_eq!(headers.get("X-TRACE").as_deref(), Some("a"));
        assert_eq!(headers.get_all("x-trace").len(), 2);

        headers.remove("X-Trace");
        assert!(headers.get("x-trace").is_none());
    }
}
