//! The GraphQL client facade.
//!
//! # Design
//! `Client` holds only immutable configuration and a shared transport, so it
//! is cheap to clone and safe to use from many tasks at once. A call is split
//! the same way as the transport types suggest:
//!
//! - `build_request` checks that the request fits the configured encoding,
//!   encodes the body and produces an `HttpRequest` without touching the
//!   network;
//! - `parse_response` turns an `HttpResponse` into data or an error;
//! - `run` does both around a transport round-trip, honouring the caller's
//!   `Context` before dispatch and while the call is in flight.

use std::fmt;
use std::sync::Arc;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::encoding::{self, Encoding, JSON_CONTENT_TYPE};
use crate::error::Error;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::request::Request;
use crate::response;

/// Receives human-readable diagnostic lines. Must not block.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

const REDACTED_HEADERS: [&str; 3] = ["authorization", "proxy-authorization", "cookie"];

/// Serializable client settings, for embedding in application config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    #[serde(default)]
    pub encoding: Encoding,
    /// Ask the server to close the connection after each request.
    #[serde(default)]
    pub close_connection: bool,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            encoding: Encoding::default(),
            close_connection: false,
        }
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    log: Option<LogSink>,
}

impl ClientBuilder {
    pub fn from_config(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            log: None,
        }
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn close_connection(mut self, close: bool) -> Self {
        self.config.close_connection = close;
        self
    }

    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.log = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> Client {
        Client {
            config: Arc::new(self.config),
            transport: self.transport,
            log: self.log,
        }
    }
}

/// A client for one GraphQL endpoint.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn HttpTransport>,
    log: Option<LogSink>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("log", &self.log.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// A client posting plain JSON bodies to `endpoint`.
    pub fn new(endpoint: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self::builder(endpoint, transport).build()
    }

    pub fn builder(endpoint: impl Into<String>, transport: Arc<dyn HttpTransport>) -> ClientBuilder {
        ClientBuilder::from_config(ClientConfig::new(endpoint), transport)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn encoding(&self) -> Encoding {
        self.config.encoding
    }

    /// Execute `req` and decode the `data` member of the response into `D`.
    ///
    /// If the server reports errors, the first one is returned even when data
    /// is also present.
    ///
    /// A successful response may carry no data at all, for example `{}` or
    /// `{"data": null}`. That is an error for a `D` that cannot hold null
    /// ([`Error::MissingData`]). Ask for `Option<T>` (or `serde_json::Value`)
    /// to receive such responses as `None`, or call
    /// [`Client::run_discarding_data`] when the payload is not needed.
    pub async fn run<D: DeserializeOwned>(&self, ctx: &Context, req: Request) -> Result<D, Error> {
        let response = self.round_trip(ctx, req).await?;
        self.parse_response(&response)
    }

    /// Execute `req`, checking the response for errors but skipping its data.
    pub async fn run_discarding_data(&self, ctx: &Context, req: Request) -> Result<(), Error> {
        let response = self.round_trip(ctx, req).await?;
        self.parse_response_discarding_data(&response)
    }

    /// Encode `req` into an `HttpRequest` for the configured endpoint.
    ///
    /// Never touches the network. Attachment streams are consumed, which is
    /// why the request is taken by value.
    pub fn build_request(&self, mut req: Request) -> Result<HttpRequest, Error> {
        let encoding = self.config.encoding;
        if !req.files().is_empty() && !encoding.supports_files() {
            return Err(Error::FilesNotSupported { encoding });
        }

        let log = |line: &str| self.log(line);
        let encoded = encoding::encode(encoding, &mut req, &log)?;

        let mut headers = vec![
            ("content-type".to_string(), encoded.content_type),
            ("accept".to_string(), JSON_CONTENT_TYPE.to_string()),
        ];
        if self.config.close_connection {
            headers.push(("connection".to_string(), "close".to_string()));
        }
        for (name, values) in req.headers() {
            for value in values {
                headers.push((name.clone(), value.clone()));
            }
        }
        self.log(&format!(">> headers: {}", format_headers(&headers)));

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.config.endpoint.clone(),
            headers,
            body: encoded.body,
        })
    }

    /// Decode a response into `D`, surfacing the first server error.
    ///
    /// Absent or null data follows the same rule as [`Client::run`].
    pub fn parse_response<D: DeserializeOwned>(&self, response: &HttpResponse) -> Result<D, Error> {
        self.log_response(response);
        match response::decode::<D>(response)? {
            Some(data) => Ok(data),
            // Absent or null data is only acceptable to targets that accept null.
            None => serde_json::from_value(Value::Null).map_err(|_| Error::MissingData),
        }
    }

    /// Check a response for errors without decoding its data.
    pub fn parse_response_discarding_data(&self, response: &HttpResponse) -> Result<(), Error> {
        self.log_response(response);
        response::decode::<IgnoredAny>(response).map(|_| ())
    }

    async fn round_trip(&self, ctx: &Context, req: Request) -> Result<HttpResponse, Error> {
        if let Some(interrupt) = ctx.interrupted() {
            return Err(interrupt.into_error());
        }
        let request = self.build_request(req)?;
        if let Some(interrupt) = ctx.interrupted() {
            return Err(interrupt.into_error());
        }

        tracing::debug!(
            endpoint = %request.url,
            bytes = request.body.len(),
            "sending graphql request"
        );
        let response = tokio::select! {
            biased;
            interrupt = ctx.done() => {
                tracing::debug!(endpoint = %self.config.endpoint, ?interrupt, "graphql request abandoned");
                return Err(interrupt.into_error());
            }
            result = self.transport.execute(request) => result.map_err(Error::Transport)?,
        };
        tracing::debug!(status = response.status, bytes = response.body.len(), "received graphql response");
        Ok(response)
    }

    fn log_response(&self, response: &HttpResponse) {
        tracing::trace!(
            status = response.status,
            body = %String::from_utf8_lossy(&response.body),
            "graphql response body"
        );
        if self.log.is_some() {
            self.log(&format!("<< {}", String::from_utf8_lossy(&response.body)));
        }
    }

    fn log(&self, line: &str) {
        if let Some(sink) = &self.log {
            sink(line);
        }
    }
}

fn format_headers(headers: &[(String, String)]) -> String {
    let shown: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            if REDACTED_HEADERS.contains(&name.as_str()) {
                format!("{name}: <redacted>")
            } else {
                format!("{name}: {value}")
            }
        })
        .collect();
    format!("[{}]", shown.join(", "))
}
