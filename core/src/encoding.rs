//! Request body encoders.
//!
//! # Design
//! The client is configured with exactly one `Encoding`. Each variant has
//! its own encoder producing the body bytes and the matching content type:
//!
//! - `Json`: `{"query": ..., "variables": {...}}`. Cannot carry files.
//! - `MultipartForm`: a `query` field, an optional `variables` field holding
//!   the JSON variables, then one file part per attachment.
//! - `MultipartRequestSpec`: the `operations` + `map` convention, where every
//!   file slot is a `null` placeholder in `operations.variables.files` and
//!   `map` points each part name at `variables.files.<index>`. Cannot carry
//!   variables.
//!
//! Every encoder emits a diagnostic preview to the log sink. File bytes are
//! never part of it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::multipart::MultipartBody;
use crate::request::Request;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Wire encoding of request bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Json,
    MultipartForm,
    MultipartRequestSpec,
}

impl Encoding {
    pub fn supports_files(&self) -> bool {
        !matches!(self, Encoding::Json)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::MultipartForm => "multipart-form",
            Encoding::MultipartRequestSpec => "multipart-request-spec",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A serialized body and its content type.
#[derive(Debug)]
pub(crate) struct EncodedBody {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Encode `req` with the given encoding.
///
/// The caller has already checked that files are compatible with `encoding`.
pub(crate) fn encode(encoding: Encoding, req: &mut Request, log: &dyn Fn(&str)) -> Result<EncodedBody, Error> {
    let encoded = match encoding {
        Encoding::Json => encode_json(req, log)?,
        Encoding::MultipartForm => encode_multipart_form(req, log)?,
        Encoding::MultipartRequestSpec => encode_multipart_request_spec(req, log)?,
    };
    tracing::debug!(
        encoding = %encoding,
        files = req.files().len(),
        bytes = encoded.body.len(),
        "encoded graphql request"
    );
    Ok(encoded)
}

#[derive(Serialize)]
struct JsonBody<'a> {
    query: &'a str,
    variables: &'a Map<String, Value>,
}

fn encode_json(req: &Request, log: &dyn Fn(&str)) -> Result<EncodedBody, Error> {
    let empty = Map::new();
    let variables = req.vars().unwrap_or(&empty);
    let body = serde_json::to_vec(&JsonBody {
        query: req.query(),
        variables,
    })
    .map_err(|source| Error::Serialization {
        what: "request body",
        source,
    })?;

    log(&format!(">> variables: {}", Value::Object(variables.clone())));
    log(&format!(">> query: {}", req.query()));

    Ok(EncodedBody {
        content_type: JSON_CONTENT_TYPE.to_string(),
        body,
    })
}

fn encode_multipart_form(req: &mut Request, log: &dyn Fn(&str)) -> Result<EncodedBody, Error> {
    let mut form = MultipartBody::new().text("query", req.query().to_string());

    let mut variables = String::new();
    if let Some(vars) = req.vars().filter(|v| !v.is_empty()) {
        variables = serde_json::to_string(vars).map_err(|source| Error::Serialization {
            what: "variables",
            source,
        })?;
        form = form.text("variables", variables.clone());
    }

    let form = add_files(req, form, |_| {})?;

    log(&format!(">> variables: {variables}"));
    log(&format!(">> files: {}", req.files().len()));
    log(&format!(">> query: {}", req.query()));

    form.finish()
}

#[derive(Serialize)]
struct Operations<'a> {
    query: &'a str,
    variables: FileSlots,
}

#[derive(Serialize)]
#[serde(untagged)]
enum FileSlots {
    Files { files: Vec<()> },
    Empty {},
}

fn encode_multipart_request_spec(req: &mut Request, log: &dyn Fn(&str)) -> Result<EncodedBody, Error> {
    if req.has_vars() {
        return Err(Error::VariablesNotSupported);
    }

    // A repeated field keeps the index of its last part; every part is still sent.
    let mut map = BTreeMap::new();
    for (index, file) in req.files().iter().enumerate() {
        map.insert(file.field.as_str(), [format!("variables.files.{index}")]);
    }

    let variables = match req.files().len() {
        0 => FileSlots::Empty {},
        n => FileSlots::Files { files: vec![(); n] },
    };
    let operations = serde_json::to_string(&Operations {
        query: req.query(),
        variables,
    })
    .map_err(|source| Error::Serialization {
        what: "operations",
        source,
    })?;
    let map = serde_json::to_string(&map).map_err(|source| Error::Serialization { what: "map", source })?;

    let form = MultipartBody::new().text("operations", operations.clone());
    log(&format!(">> field: operations = {operations}"));
    let form = form.text("map", map.clone());
    log(&format!(">> field: map = {map}"));

    let form = add_files(req, form, |file| {
        log(&format!(">> file: {} = {}", file.field, file.name));
    })?;

    form.finish()
}

fn add_files(
    req: &mut Request,
    mut form: MultipartBody,
    mut on_added: impl FnMut(&crate::request::File),
) -> Result<MultipartBody, Error> {
    for file in req.files_mut() {
        let field = file.field.clone();
        let name = file.name.clone();
        form = form.file(&field, &name, file.reader())?;
        on_added(file);
    }
    Ok(form)
}
