//! The GraphQL request model.
//!
//! A `Request` accumulates the query, variables, file attachments and extra
//! headers before it is handed to `Client::run`. It owns the attachment
//! streams, so sending consumes it: each stream is read exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde_json::{Map, Value};

/// A file to upload alongside the operation.
pub struct File {
    /// Multipart part name, and the key of the request spec `map`.
    pub field: String,
    /// Filename reported to the server.
    pub name: String,
    pub(crate) reader: Box<dyn Read + Send>,
}

impl File {
    /// Borrow the content stream. Reading it advances the stream for good.
    pub fn reader(&mut self) -> &mut (dyn Read + Send) {
        self.reader.as_mut()
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("field", &self.field)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A GraphQL request.
#[derive(Debug)]
pub struct Request {
    query: String,
    vars: Option<Map<String, Value>>,
    files: Vec<File>,
    headers: BTreeMap<String, Vec<String>>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            vars: None,
            files: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    /// Set a variable, replacing any previous value under the same name.
    pub fn var(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    /// Append a file attachment. Field names are not checked for uniqueness.
    pub fn file<R>(&mut self, field: impl Into<String>, name: impl Into<String>, reader: R) -> &mut Self
    where
        R: Read + Send + 'static,
    {
        self.files.push(File {
            field: field.into(),
            name: name.into(),
            reader: Box::new(reader),
        });
        self
    }

    /// Append a header value. Existing values for the same name are kept.
    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Replace all values of a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// The variables, or `None` if none were ever set.
    pub fn vars(&self) -> Option<&Map<String, Value>> {
        self.vars.as_ref()
    }

    pub fn has_vars(&self) -> bool {
        self.vars.as_ref().is_some_and(|v| !v.is_empty())
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub(crate) fn files_mut(&mut self) -> &mut [File] {
        &mut self.files
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }
}
