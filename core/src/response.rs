//! Response envelope decoding.
//!
//! # Design
//! Every GraphQL response is read as `{"data": ..., "errors": [...]}`. The
//! data slot is generic, so the caller chooses the shape by picking `D`
//! (`serde::de::IgnoredAny` when the payload is not wanted). Decoding is
//! reconciled against the HTTP status:
//!
//! - body is not an envelope, status not 2xx: `Error::HttpStatus`, since the
//!   server most likely answered with an error page;
//! - body is not an envelope, status 2xx: `Error::Deserialization`;
//! - envelope with errors: the first error wins, even if data is present;
//! - otherwise the data slot is returned.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::http::HttpResponse;

/// A location in the query document that an error refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// An error reported by the GraphQL server.
///
/// Only `message` is required. The other members may be absent or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graphql: {}", self.message)
    }
}

impl std::error::Error for ServerError {}

#[derive(Deserialize)]
#[serde(bound = "D: DeserializeOwned")]
struct Envelope<D> {
    #[serde(default)]
    data: Option<D>,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<ServerError>,
}

fn null_as_default<'de, T, De>(deserializer: De) -> Result<T, De::Error>
where
    T: Default + Deserialize<'de>,
    De: Deserializer<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a response into its data slot.
///
/// Returns `Ok(None)` when the envelope has no errors and `data` is absent
/// or `null`.
pub(crate) fn decode<D: DeserializeOwned>(response: &HttpResponse) -> Result<Option<D>, Error> {
    let envelope: Envelope<D> = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(err) if !response.is_success() => {
            tracing::debug!(status = response.status, error = %err, "non-json error response");
            return Err(Error::HttpStatus {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Err(err) => {
            tracing::debug!(status = response.status, error = %err, "malformed graphql response");
            return Err(Error::Deserialization(err));
        }
    };

    if let Some(first) = envelope.errors.into_iter().next() {
        tracing::debug!(status = response.status, message = %first.message, "graphql server error");
        return Err(Error::Server(first));
    }
    Ok(envelope.data)
}
