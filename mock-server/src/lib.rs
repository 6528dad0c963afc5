use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Size of the `blob` string returned by `/large`, above ureq's 10 MB default cap.
pub const LARGE_BLOB_LEN: usize = 12 * 1024 * 1024;

/// What the server saw in a GraphQL request, echoed back under `data.echo`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Received {
    pub kind: String,
    pub query: Option<String>,
    pub variables: Option<Value>,
    pub operations: Option<Value>,
    pub map: Option<Value>,
    pub files: Vec<ReceivedFile>,
    pub headers: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceivedFile {
    pub field: String,
    pub name: String,
    pub size: usize,
    pub content: String,
}

#[derive(Deserialize)]
struct JsonBody {
    query: String,
    #[serde(default)]
    variables: Option<Value>,
}

pub fn app() -> Router {
    Router::new()
        .route("/graphql", post(graphql))
        .route("/unavailable", post(unavailable))
        .route("/garbage", post(garbage))
        .route("/large", post(large))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn graphql(request: Request) -> Response {
    let headers = echoed_headers(request.headers());
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let parsed = if is_multipart {
        parse_multipart(request).await
    } else {
        parse_json(request).await
    };
    let mut received = match parsed {
        Ok(received) => received,
        Err(message) => {
            tracing::warn!(%message, "rejecting malformed graphql request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": [{ "message": message }] })),
            )
                .into_response();
        }
    };
    received.headers = headers;
    tracing::info!(kind = %received.kind, files = received.files.len(), "graphql request");

    let query = received.query.clone().unwrap_or_default();
    if query.contains("fail") {
        return Json(json!({
            "data": null,
            "errors": [
                { "message": "requested failure", "path": ["fail"] },
                { "message": "second failure" }
            ]
        }))
        .into_response();
    }

    Json(json!({
        "data": {
            "hero": { "name": "R2-D2" },
            "echo": received,
        }
    }))
    .into_response()
}

async fn parse_json(request: Request) -> Result<Received, String> {
    let bytes = Bytes::from_request(request, &()).await.map_err(|e| e.to_string())?;
    let body: JsonBody = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
    Ok(Received {
        kind: "json".to_string(),
        query: Some(body.query),
        variables: body.variables,
        ..Received::default()
    })
}

async fn parse_multipart(request: Request) -> Result<Received, String> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| e.to_string())?;
    let mut received = Received {
        kind: "multipart".to_string(),
        ..Received::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| e.to_string())?;

        if let Some(file_name) = file_name {
            received.files.push(ReceivedFile {
                field: name,
                name: file_name,
                size: bytes.len(),
                content: String::from_utf8_lossy(&bytes).into_owned(),
            });
            continue;
        }

        match name.as_str() {
            "query" => received.query = Some(String::from_utf8_lossy(&bytes).into_owned()),
            "variables" => received.variables = Some(parse_field(&name, &bytes)?),
            "operations" => {
                let operations = parse_field(&name, &bytes)?;
                received.query = operations["query"].as_str().map(str::to_string);
                received.operations = Some(operations);
            }
            "map" => received.map = Some(parse_field(&name, &bytes)?),
            other => return Err(format!("unexpected field {other:?}")),
        }
    }

    if received.query.is_none() {
        return Err("missing query".to_string());
    }
    Ok(received)
}

fn parse_field(name: &str, bytes: &[u8]) -> Result<Value, String> {
    serde_json::from_slice(bytes).map_err(|e| format!("field {name:?} is not JSON: {e}"))
}

fn echoed_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut echoed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str();
        if !(name.starts_with("x-") || name == "connection") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            echoed.entry(name.to_string()).or_default().push(value.to_string());
        }
    }
    echoed
}

async fn unavailable() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Html("<html><body><h1>503 Service Unavailable</h1></body></html>"),
    )
}

async fn garbage() -> &'static str {
    "this is not json"
}

async fn large() -> Json<Value> {
    Json(json!({"data": {"blob": "x".repeat(LARGE_BLOB_LEN)}}))
}
