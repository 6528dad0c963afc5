//! Client behaviour against in-memory transports.
//!
//! A recording transport counts round-trips and keeps the last request, so
//! these tests can prove that rejected or cancelled calls never reach the
//! network and inspect exactly what would have been sent.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gql_core::{
    CancellationToken, Client, Context, Encoding, Error, HttpRequest, HttpResponse, HttpTransport, Request,
    TransportError,
};
use serde_json::{json, Value};

#[derive(Default)]
struct Recording {
    calls: AtomicUsize,
    last: Mutex<Option<HttpRequest>>,
    reply: Option<(u16, &'static str)>,
}

impl Recording {
    fn replying(status: u16, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some((status, body)),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> HttpRequest {
        self.last.lock().unwrap().clone().expect("no request recorded")
    }
}

#[async_trait]
impl HttpTransport for Recording {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        match self.reply {
            Some((status, body)) => Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.as_bytes().to_vec(),
            }),
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection refused")
    }
}

impl std::error::Error for Refused {}

struct Failing;

#[async_trait]
impl HttpTransport for Failing {
    async fn execute(&self, _: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(Box::new(Refused))
    }
}

fn client(transport: Arc<Recording>, encoding: Encoding) -> Client {
    Client::builder("http://localhost/graphql", transport)
        .encoding(encoding)
        .build()
}

/// Split a multipart body into (part name, content) pairs using the boundary
/// from the content type.
fn multipart_parts(request: &HttpRequest) -> Vec<(String, String)> {
    let content_type = request.header("content-type").unwrap();
    let boundary = content_type.split("boundary=").nth(1).unwrap();
    let body = String::from_utf8(request.body.clone()).unwrap();
    let closing = format!("--{boundary}--\r\n");
    let delimiter = format!("--{boundary}\r\n");

    body.trim_end_matches(closing.as_str())
        .split(delimiter.as_str())
        .filter(|p| !p.is_empty())
        .map(|part| {
            let (head, content) = part.split_once("\r\n\r\n").unwrap();
            let name = head
                .split("name=\"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap()
                .to_string();
            (name, content.trim_end_matches("\r\n").to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn files_under_json_never_reach_the_transport() {
    let transport = Recording::replying(200, "{}");
    let client = client(transport.clone(), Encoding::Json);

    let mut req = Request::new("{ a }");
    req.file("f", "f.txt", &b"data"[..]);
    let err = client.run_discarding_data(&Context::background(), req).await.unwrap_err();

    assert!(matches!(err, Error::FilesNotSupported { .. }));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn variables_under_request_spec_never_reach_the_transport() {
    let transport = Recording::replying(200, "{}");
    let client = client(transport.clone(), Encoding::MultipartRequestSpec);

    let mut req = Request::new("{ a }");
    req.var("x", 1);
    let err = client.run_discarding_data(&Context::background(), req).await.unwrap_err();

    assert!(matches!(err, Error::VariablesNotSupported));
    assert_eq!(transport.calls(), 0);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_before_send_sends_nothing() {
    let transport = Recording::replying(200, "{}");
    let client = client(transport.clone(), Encoding::Json);
    let token = CancellationToken::new();
    token.cancel();

    // Cancellation is checked before the file/mode check.
    let mut req = Request::new("{ a }");
    req.file("f", "f.txt", &b"data"[..]);
    let err = client
        .run_discarding_data(&Context::with_token(token), req)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_deadline_sends_nothing() {
    let transport = Recording::replying(200, "{}");
    let client = client(transport.clone(), Encoding::Json);
    let ctx = Context::background().with_timeout(Duration::from_millis(10));
    tokio::time::advance(Duration::from_millis(20)).await;

    let err = client
        .run_discarding_data(&ctx, Request::new("{ a }"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn cancel_during_flight_aborts_the_call() {
    let transport = Arc::new(Recording::default());
    let client = client(transport.clone(), Encoding::Json);
    let token = CancellationToken::new();
    let ctx = Context::with_token(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let err = client
        .run_discarding_data(&ctx, Request::new("{ a }"))
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_during_flight_aborts_the_call() {
    let transport = Arc::new(Recording::default());
    let client = client(transport.clone(), Encoding::Json);
    let ctx = Context::background().with_timeout(Duration::from_secs(5));

    let err = client
        .run_discarding_data(&ctx, Request::new("{ a }"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded));
    assert_eq!(transport.calls(), 1);
}

// ---------------------------------------------------------------------------
// Transport failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_error_is_returned_verbatim() {
    let client = Client::new("http://localhost/graphql", Arc::new(Failing));
    let err = client
        .run_discarding_data(&Context::background(), Request::new("{ a }"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "connection refused");
    let inner = match err {
        Error::Transport(inner) => inner,
        other => panic!("expected transport error, got {other:?}"),
    };
    assert!(inner.downcast_ref::<Refused>().is_some());
}

// ---------------------------------------------------------------------------
// What goes on the wire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn caller_headers_are_appended_after_defaults() {
    let transport = Recording::replying(200, r#"{"data":{}}"#);
    let client = client(transport.clone(), Encoding::Json);

    let mut req = Request::new("{ a }");
    req.header("Content-Type", "application/graphql").header("X-Tag", "1").header("X-Tag", "2");
    client.run_discarding_data(&Context::background(), req).await.unwrap();

    let sent = transport.last();
    assert_eq!(sent.url, "http://localhost/graphql");
    assert_eq!(
        sent.header_values("content-type").collect::<Vec<_>>(),
        vec!["application/json; charset=utf-8", "application/graphql"]
    );
    assert_eq!(sent.header("accept"), Some("application/json; charset=utf-8"));
    assert_eq!(sent.header_values("x-tag").collect::<Vec<_>>(), vec!["1", "2"]);
    assert_eq!(sent.header("connection"), None);
}

#[tokio::test]
async fn multipart_form_two_files_and_one_variable() {
    let transport = Recording::replying(200, r#"{"data":{}}"#);
    let client = client(transport.clone(), Encoding::MultipartForm);

    let mut req = Request::new("mutation { upload }");
    req.file("a", "a.txt", &b"alpha"[..])
        .file("b", "b.txt", &b"beta"[..])
        .var("x", 1);
    client.run_discarding_data(&Context::background(), req).await.unwrap();

    let parts = multipart_parts(&transport.last());
    let names: Vec<_> = parts.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["query", "variables", "a", "b"]);
    let variables: Value = serde_json::from_str(&parts[1].1).unwrap();
    assert_eq!(variables, json!({"x": 1}));
}

#[tokio::test]
async fn request_spec_map_matches_file_order() {
    for n in 0..4 {
        let transport = Recording::replying(200, r#"{"data":{}}"#);
        let client = client(transport.clone(), Encoding::MultipartRequestSpec);

        let mut req = Request::new("mutation { upload }");
        for i in 0..n {
            req.file(format!("file{i}"), format!("{i}.bin"), std::io::Cursor::new(vec![i as u8]));
        }
        client.run_discarding_data(&Context::background(), req).await.unwrap();

        let parts = multipart_parts(&transport.last());
        assert_eq!(parts.len(), 2 + n, "n={n}");
        let operations: Value = serde_json::from_str(&parts[0].1).unwrap();
        let map: Value = serde_json::from_str(&parts[1].1).unwrap();
        let map = map.as_object().unwrap();
        assert_eq!(map.len(), n, "n={n}");

        if n == 0 {
            assert_eq!(operations["variables"], json!({}));
        } else {
            let files = operations["variables"]["files"].as_array().unwrap();
            assert_eq!(files.len(), n);
            assert!(files.iter().all(Value::is_null));
        }
        for i in 0..n {
            assert_eq!(map[&format!("file{i}")], json!([format!("variables.files.{i}")]));
            assert_eq!(parts[2 + i].0, format!("file{i}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_server_error_wins_over_populated_data() {
    let transport = Recording::replying(
        200,
        r#"{"data":{"hero":{"name":"R2-D2"}},"errors":[{"message":"partial"},{"message":"other"}]}"#,
    );
    let client = client(transport, Encoding::Json);

    let err = client
        .run::<Value>(&Context::background(), Request::new("{ hero { name } }"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "graphql: partial");
}

#[tokio::test]
async fn shared_client_serves_concurrent_calls() {
    let transport = Recording::replying(200, r#"{"data":{"n":1}}"#);
    let client = client(transport.clone(), Encoding::Json);

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let mut req = Request::new("query ($i: Int) { n }");
            req.var("i", i);
            client.run::<Value>(&Context::background(), req).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), json!({"n": 1}));
    }
    assert_eq!(transport.calls(), 8);
}
