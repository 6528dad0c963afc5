//! Asynchronous GraphQL-over-HTTP client core.
//!
//! # Overview
//! Serializes a query and its variables, optionally attaches files using one
//! of two multipart conventions, posts the body through an injected
//! `HttpTransport` and decodes the response envelope into a caller-chosen
//! type or the first server-reported error.
//!
//! # Design
//! - `Client` is immutable after construction and cheap to clone.
//! - Each call is split into `build_request` (encode, no I/O) and
//!   `parse_response` (decode, no I/O); `run` wraps both around a transport
//!   round-trip under a cancellable `Context`.
//! - There is no implicit default transport. `UreqTransport` (feature
//!   `ureq`) is provided but must be passed in explicitly.
//!
//! ```no_run
//! # async fn example() -> Result<(), gql_core::Error> {
//! use std::sync::Arc;
//! use gql_core::{Client, Context, Request, UreqTransport};
//!
//! #[derive(serde::Deserialize)]
//! struct Items {
//!     items: Vec<String>,
//! }
//!
//! let client = Client::new("https://example.com/graphql", Arc::new(UreqTransport::new()));
//! let mut req = Request::new("query ($key: String!) { items(id: $key) }");
//! req.var("key", "value");
//! let data: Items = client.run(&Context::background(), req).await?;
//! # let _ = data.items;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod encoding;
pub mod error;
pub mod http;
mod multipart;
pub mod request;
pub mod response;
#[cfg(feature = "ureq")]
pub mod transport;

pub use client::{Client, ClientBuilder, ClientConfig, LogSink};
pub use context::{CancellationToken, Context};
pub use encoding::Encoding;
pub use error::Error;
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
pub use request::{File, Request};
pub use response::{Location, ServerError};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
