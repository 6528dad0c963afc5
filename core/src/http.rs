//! HTTP transport types and the injected transport capability.
//!
//! # Design
//! Requests and responses are plain data. The client builds an `HttpRequest`
//! and parses an `HttpResponse` without touching the network; the only I/O
//! happens inside an `HttpTransport` implementation supplied by the caller.
//! This keeps encoding and decoding deterministic and lets tests swap in an
//! in-memory transport.

use async_trait::async_trait;

/// Error type surfaced by transports. Returned to the caller unchanged.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP method for a request. GraphQL operations are always posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `Client::build_request`. Header names are lowercase; a name may
/// appear more than once and the order is the order of transmission.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// All values of a header, in order.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(&name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).next()
    }
}

/// An HTTP response described as plain data, with the body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single HTTP round-trip.
///
/// Implementations must be safe to share across concurrent calls; connection
/// pooling is their concern. A non-2xx status is a valid response, not an
/// error. The returned body must be complete: the client never streams.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
