use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

use crate::OutcallResult;
use crate::context::{CORRELATION_ID_HEADER, ContextProvider, REQUEST_ID_HEADER, RequestContext};
use crate::error::Error;
use crate::redact::{redact_headers, redact_url};
use crate::request::RequestBuilder;
use crate::response::Response;
use crate::retry::RetryPolicy;
use crate::util::{
    build_http_request, classify_transport_error, merge_headers, parse_header_name,
    parse_header_value, resolve_url, truncate_body, validate_base_url,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DEPENDENCY_NAME: &str = "outcall";
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;
const ERROR_CLASS_DEPENDENCY: &str = "dependency";

type Transport = HyperClient<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

enum AttemptFailure {
    Transport(hyper_util::client::legacy::Error),
    ReadBody(hyper::Error),
}

pub(crate) struct RequestOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry_policy: Option<RetryPolicy>,
    pub(crate) context: Option<RequestContext>,
}

pub struct ClientBuilder {
    base_url: String,
    dependency_name: String,
    default_headers: HeaderMap,
    timeout: Duration,
    retry_policy: RetryPolicy,
    context_provider: Arc<dyn ContextProvider>,
}

impl ClientBuilder {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            dependency_name: DEFAULT_DEPENDENCY_NAME.to_owned(),
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::standard(),
            context_provider: Arc::new(RequestContext::generate),
        }
    }

    pub fn dependency_name(mut self, dependency_name: impl Into<String>) -> Self {
        self.dependency_name = dependency_name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn context_provider(self, context_provider: impl ContextProvider + 'static) -> Self {
        self.context_provider_arc(Arc::new(context_provider))
    }

    pub fn context_provider_arc(mut self, context_provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = context_provider;
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn try_default_header(self, name: &str, value: &str) -> OutcallResult<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.default_header(name, value))
    }

    pub fn build(self) -> OutcallResult<Client> {
        validate_base_url(&self.base_url)?;
        let transport = build_transport()?;
        Ok(Client {
            base_url: self.base_url,
            dependency_name: self.dependency_name,
            default_headers: self.default_headers,
            timeout: self.timeout,
            retry_policy: self.retry_policy,
            context_provider: self.context_provider,
            transport,
        })
    }
}

#[derive(Clone)]
pub struct Client {
    base_url: String,
    dependency_name: String,
    default_headers: HeaderMap,
    timeout: Duration,
    retry_policy: RetryPolicy,
    context_provider: Arc<dyn ContextProvider>,
    transport: Transport,
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dependency_name(&self) -> &str {
        &self.dependency_name
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, path.into())
    }

    pub fn get(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn head(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::HEAD, path)
    }

    pub fn options(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::OPTIONS, path)
    }

    pub(crate) async fn send_request(
        &self,
        method: Method,
        path: String,
        request_headers: HeaderMap,
        body: Option<Bytes>,
        options: RequestOptions,
    ) -> OutcallResult<Response> {
        let (url_text, uri) = resolve_url(&self.base_url, &path)?;
        let redacted_url = redact_url(&url_text);
        let mut headers = merge_headers(&self.default_headers, &request_headers);
        let context = match options.context {
            Some(context) => context,
            None => self.context_provider.context(),
        };
        apply_tracing_headers(&mut headers, context.correlation_id())?;
        let timeout_value = options
            .timeout
            .unwrap_or(self.timeout)
            .max(Duration::from_millis(1));
        let retry_policy = options
            .retry_policy
            .unwrap_or_else(|| self.retry_policy.clone());
        let body = body.unwrap_or_default();
        let max_attempts = retry_policy.max_attempts();
        let started = Instant::now();
        let mut attempt = 0_usize;

        loop {
            let request = build_http_request(method.clone(), uri.clone(), &headers, body.clone())?;
            let failure = match timeout(timeout_value, execute_attempt(&self.transport, request))
                .await
            {
                Ok(Ok((status, response_headers, response_body))) => {
                    if status.is_success() {
                        let elapsed = started.elapsed();
                        info!(
                            dependency = %self.dependency_name,
                            method = %method,
                            url = %redacted_url,
                            status = status.as_u16(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            correlation_id = %context.correlation_id(),
                            source = %context.source(),
                            attempts = attempt + 1,
                            outcome = "success",
                            "request completed"
                        );
                        return Ok(Response::new(
                            status,
                            response_headers,
                            response_body,
                            elapsed,
                            context.correlation_id().to_owned(),
                        ));
                    }
                    Error::HttpStatus {
                        status: status.as_u16(),
                        body: truncate_body(&response_body),
                        method: method.clone(),
                        url: redacted_url.clone(),
                        correlation_id: context.correlation_id().to_owned(),
                    }
                }
                Ok(Err(AttemptFailure::Transport(source))) => {
                    let kind = classify_transport_error(&source);
                    Error::Transport {
                        kind,
                        method: method.clone(),
                        url: redacted_url.clone(),
                        correlation_id: context.correlation_id().to_owned(),
                        source: Box::new(source),
                    }
                }
                Ok(Err(AttemptFailure::ReadBody(source))) => Error::ReadBody {
                    method: method.clone(),
                    url: redacted_url.clone(),
                    correlation_id: context.correlation_id().to_owned(),
                    source: Box::new(source),
                },
                Err(_elapsed) => Error::Timeout {
                    timeout_ms: timeout_value.as_millis(),
                    method: method.clone(),
                    url: redacted_url.clone(),
                    correlation_id: context.correlation_id().to_owned(),
                },
            };

            let recoverable = failure.is_recoverable();
            if recoverable && attempt + 1 < max_attempts {
                let delay = retry_policy.delay_for_attempt(attempt);
                debug!(
                    dependency = %self.dependency_name,
                    method = %method,
                    url = %redacted_url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    correlation_id = %context.correlation_id(),
                    error = %failure,
                    "retrying request after recoverable failure"
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                attempt += 1;
                continue;
            }

            error!(
                dependency = %self.dependency_name,
                method = %method,
                url = %redacted_url,
                status = failure.status(),
                error = %failure,
                correlation_id = %context.correlation_id(),
                source = %context.source(),
                headers = ?redact_headers(&headers),
                error_class = ERROR_CLASS_DEPENDENCY,
                is_recoverable = recoverable,
                attempts = attempt + 1,
                outcome = "error",
                "request failed"
            );
            return Err(failure);
        }
    }
}

async fn execute_attempt(
    transport: &Transport,
    request: http::Request<Full<Bytes>>,
) -> Result<(StatusCode, HeaderMap, Bytes), AttemptFailure> {
    let response = transport
        .request(request)
        .await
        .map_err(AttemptFailure::Transport)?;
    let (parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map_err(AttemptFailure::ReadBody)?
        .to_bytes();
    Ok((parts.status, parts.headers, body))
}

fn apply_tracing_headers(headers: &mut HeaderMap, correlation_id: &str) -> OutcallResult<()> {
    let value = parse_header_value(REQUEST_ID_HEADER, correlation_id)?;
    headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value.clone());
    headers.insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    Ok(())
}

fn build_transport() -> OutcallResult<Transport> {
    let https = HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
        .map_err(|source| Error::TlsInit {
            message: source.to_string(),
        })?
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();
    let transport = HyperClient::builder(TokioExecutor::new())
        .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(DEFAULT_POOL_MAX_IDLE_PER_HOST)
        .build(https);
    Ok(transport)
}
