//! `HttpTransport` backed by a blocking `ureq` agent.
//!
//! The agent is shared between calls and pools connections itself. Each call
//! runs on tokio's blocking pool; when the client abandons a call (cancelled
//! or past its deadline) the blocking request finishes in the background and
//! its result is dropped.
//!
//! Response bodies are read in full: ureq's default 10 MB cap is lifted, so
//! bounding response size is left to the server and the call's deadline.

use std::fmt;

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};

const RESPONSE_BODY_LIMIT: u64 = u64::MAX;

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// A transport with ureq's default configuration, except that non-2xx
    /// statuses are returned as responses.
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request)).await?
    }
}

fn execute_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let mut builder = ureq::http::Request::builder()
        .method(request.method.as_str())
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let mut response = agent.run(builder.body(request.body)?)?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .with_config()
        .limit(RESPONSE_BODY_LIMIT)
        .read_to_vec()?;

    Ok(HttpResponse { status, headers, body })
}
