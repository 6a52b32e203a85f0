//! Transport abstraction the scanner and client depend on.
//!
//! A [`Transport`] performs one blocking round-trip: method, absolute URL,
//! optional JSON body in; status code and parsed JSON body out. Connection
//! pooling, authentication, and retries belong to the implementation.
//!
//! [`InMemoryEngine`](memory::InMemoryEngine) simulates the engine for tests.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Error, Result};

/// HTTP methods the toolkit issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::invalid("method", s, "GET, POST, PUT, DELETE")),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code and parsed body of one round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking request/response exchange with the search engine.
///
/// Implementations return [`Error::Transport`] when no response was
/// obtained. Any HTTP status, including 4xx and 5xx, is a successful
/// round-trip and comes back as a [`Response`].
pub trait Transport {
    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        (**self).send(method, url, body)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        (**self).send(method, url, body)
    }
}
