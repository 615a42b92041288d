use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use lazy_static::lazy_static;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

use crate::models::error::TransportError;
use crate::models::iteration_result::{FailureKind, Outcome};
use crate::models::request_spec::{HttpMethod, RequestSpec};

lazy_static! {
    static ref USER_AGENT: String = {
        let info = os_info::get();
        format!(
            "{} {} ({}; {})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            info.os_type(),
            info.version()
        )
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Performs a single request. Implementations must be shareable across all
/// virtual users.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        spec: &RequestSpec,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// [`Transport`] backed by one pooled `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let builder = Client::builder().user_agent(USER_AGENT.as_str());
        let client = match timeout {
            Some(timeout) => builder
                .timeout(timeout)
                .build()
                .context("failed to build http client with timeout")?,
            None => builder.build().context("failed to build http client")?,
        };
        Ok(ReqwestTransport { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Protocol(err.to_string())
        }
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn to_header_map(spec: &RequestSpec) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::with_capacity(spec.headers.len());
    for (name, value) in &spec.headers {
        let header_name = name
            .parse::<HeaderName>()
            .map_err(|_| TransportError::InvalidRequest(format!("bad header name: {:?}", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidRequest(format!("bad header value for {}", name)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

impl Transport for ReqwestTransport {
    async fn send(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        let headers = to_header_map(spec)?;
        let mut request = self
            .client
            .request(to_method(spec.method), &spec.url)
            .headers(headers);
        if !spec.body.is_empty() {
            request = request.body(spec.body.clone());
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status_code = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(Response {
            status_code,
            body: body.to_vec(),
            elapsed: start.elapsed(),
        })
    }
}

/// Maps a transport result to an iteration outcome. Any 2xx is a success.
pub fn outcome_of(result: &Result<Response, TransportError>) -> Outcome {
    match result {
        Ok(response) if (200..300).contains(&response.status_code) => {
            Outcome::Success(response.status_code)
        }
        Ok(response) => Outcome::Failure(FailureKind::Status(response.status_code)),
        Err(err) => Outcome::Failure(FailureKind::from(err)),
    }
}

/// Builds an iteration function that sends one freshly built request per call.
pub fn http_iteration<T, S>(
    transport: Arc<T>,
    make_spec: S,
) -> impl Fn() -> BoxFuture<'static, Outcome> + Clone + Send + Sync + 'static
where
    T: Transport + 'static,
    S: Fn() -> RequestSpec + Send + Sync + 'static,
{
    let make_spec = Arc::new(make_spec);
    move || {
        let transport = transport.clone();
        let spec = (*make_spec)();
        async move {
            let result = transport.send(&spec).await;
            if let Err(ref e) = result {
                tracing::debug!("{} {} failed: {}", spec.method, spec.url, e);
            }
            outcome_of(&result)
        }
        .boxed()
    }
}
