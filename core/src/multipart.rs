//! `multipart/form-data` bodies built with `reqwest::multipart`.
//!
//! Parts are collected into a `reqwest::multipart::Form`, which owns the
//! boundary and the encoding of part names and filenames. The finished form
//! is then drained into memory, so the outgoing request stays plain data and
//! the transport never sees a `reqwest` type. File content is read once, in
//! the order the parts are added.

use std::io::Read;

use futures_util::FutureExt;
use http_body_util::BodyExt;
use reqwest::multipart::{Form, Part};

use crate::encoding::EncodedBody;
use crate::error::Error;

const FILE_CONTENT_TYPE: &str = "application/octet-stream";

// Only the body of this request is kept.
const DRAIN_URL: &str = "http://localhost/";

pub(crate) struct MultipartBody {
    form: Form,
}

impl MultipartBody {
    pub(crate) fn new() -> Self {
        Self { form: Form::new() }
    }

    /// Add a plain form field.
    pub(crate) fn text(mut self, name: &str, value: String) -> Self {
        self.form = self.form.text(name.to_string(), value);
        self
    }

    /// Add a file part, reading `reader` to its end.
    pub(crate) fn file(mut self, field: &str, filename: &str, reader: &mut dyn Read) -> Result<Self, Error> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content).map_err(|source| Error::FileRead {
            field: field.to_string(),
            source,
        })?;
        let part = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(FILE_CONTENT_TYPE)
            .map_err(|err| Error::Multipart(err.into()))?;
        self.form = self.form.part(field.to_string(), part);
        Ok(self)
    }

    /// Serialize every part and the closing delimiter.
    pub(crate) fn finish(self) -> Result<EncodedBody, Error> {
        let content_type = format!("multipart/form-data; boundary={}", self.form.boundary());

        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|err| Error::Multipart(err.into()))?;
        let mut request = client
            .post(DRAIN_URL)
            .multipart(self.form)
            .build()
            .map_err(|err| Error::Multipart(err.into()))?;

        let Some(body) = request.body_mut().take() else {
            return Ok(EncodedBody {
                content_type,
                body: Vec::new(),
            });
        };
        // Every part is already in memory, so the body resolves on first poll.
        let collected = match body.collect().now_or_never() {
            Some(collected) => collected.map_err(|err| Error::Multipart(err.into()))?,
            None => return Err(Error::Multipart("multipart body did not resolve in memory".into())),
        };

        Ok(EncodedBody {
            content_type,
            body: collected.to_bytes().to_vec(),
        })
    }
}
