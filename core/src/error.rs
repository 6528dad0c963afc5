//! Error types for the GraphQL client.
//!
//! # Design
//! A single enum covers every way a call can end without data. Variants are
//! grouped by the phase that produces them: preconditions and encoding fail
//! before any network activity, transport failures (including cancellation)
//! are surfaced verbatim, and decoding distinguishes a non-JSON error page
//! (`HttpStatus`) from an unexpected body shape (`Deserialization`). A
//! non-empty `errors` list in the response envelope becomes `Server`.

use std::io;

use thiserror::Error;

use crate::encoding::Encoding;
use crate::http::TransportError;
use crate::response::ServerError;

/// Errors returned by `Client` build, parse and run methods.
#[derive(Debug, Error)]
pub enum Error {
    /// The request carries file attachments but the client encodes bodies as
    /// plain JSON.
    #[error("graphql: cannot send files with {encoding} encoding")]
    FilesNotSupported { encoding: Encoding },

    /// The request carries variables but the client uses the multipart
    /// request spec, whose `map` convention only addresses file slots.
    #[error("graphql: variables are not supported by the multipart request spec")]
    VariablesNotSupported,

    /// A part of the outgoing body could not be serialized to JSON.
    #[error("graphql: failed to encode {what}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The multipart encoder could not assemble the body.
    #[error("graphql: failed to build multipart body")]
    Multipart(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An attachment's content stream failed while being copied into its part.
    #[error("graphql: failed to read file {field:?}")]
    FileRead {
        field: String,
        #[source]
        source: io::Error,
    },

    /// The call was cancelled before or during the round-trip.
    #[error("graphql: request cancelled")]
    Cancelled,

    /// The call's deadline passed before or during the round-trip.
    #[error("graphql: deadline exceeded")]
    DeadlineExceeded,

    /// The transport failed to complete the round-trip.
    #[error(transparent)]
    Transport(TransportError),

    /// The body was not a response envelope and the status was not 2xx.
    #[error("graphql: server returned a non-200 status code: {status}")]
    HttpStatus { status: u16, body: String },

    /// The status was 2xx but the body was not a response envelope.
    #[error("graphql: failed to decode response")]
    Deserialization(#[source] serde_json::Error),

    /// The server reported at least one error; this is the first of them.
    #[error(transparent)]
    Server(ServerError),

    /// The envelope had neither errors nor a `data` payload.
    #[error("graphql: response contained no data")]
    MissingData,
}

impl Error {
    /// Whether the error was raised before any byte was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::FilesNotSupported { .. } | Error::VariablesNotSupported)
    }

    /// The HTTP status that produced this error, if it was status-driven.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
