use http::Method;
use thiserror::Error as ThisError;

use crate::retry::{is_retryable_status_code, is_retryable_transport};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidUrl,
    SerializeJson,
    SerializeQuery,
    SerializeForm,
    InvalidHeaderName,
    InvalidHeaderValue,
    RequestBuild,
    TlsInit,
    Transport,
    Timeout,
    ReadBody,
    HttpStatus,
    DeserializeJson,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::SerializeJson => "serialize_json",
            Self::SerializeQuery => "serialize_query",
            Self::SerializeForm => "serialize_form",
            Self::InvalidHeaderName => "invalid_header_name",
            Self::InvalidHeaderValue => "invalid_header_value",
            Self::RequestBuild => "request_build",
            Self::TlsInit => "tls_init",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::ReadBody => "read_body",
            Self::HttpStatus => "http_status",
            Self::DeserializeJson => "deserialize_json",
        }
    }

    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::InvalidUrl,
            Self::SerializeJson,
            Self::SerializeQuery,
            Self::SerializeForm,
            Self::InvalidHeaderName,
            Self::InvalidHeaderValue,
            Self::RequestBuild,
            Self::TlsInit,
            Self::Transport,
            Self::Timeout,
            Self::ReadBody,
            Self::HttpStatus,
            Self::DeserializeJson,
        ]
    }
}

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid request url: {url}")]
    InvalidUrl { url: String },
    #[error("failed to serialize request json: {source}")]
    SerializeJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize request query: {source}")]
    SerializeQuery {
        #[source]
        source: serde_urlencoded::ser::Error,
    },
    #[error("failed to serialize request form: {source}")]
    SerializeForm {
        #[source]
        source: serde_urlencoded::ser::Error,
    },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("failed to build http request: {source}")]
    RequestBuild {
        #[source]
        source: http::Error,
    },
    #[error("failed to initialize tls: {message}")]
    TlsInit { message: String },
    #[error("transport error ({kind}) for {method} {url} [{correlation_id}]: {source}")]
    Transport {
        kind: TransportErrorKind,
        method: Method,
        url: String,
        correlation_id: String,
        #[source]
        source: BoxError,
    },
    #[error("request timed out after {timeout_ms}ms for {method} {url} [{correlation_id}]")]
    Timeout {
        timeout_ms: u128,
        method: Method,
        url: String,
        correlation_id: String,
    },
    #[error("failed to read response body for {method} {url} [{correlation_id}]: {source}")]
    ReadBody {
        method: Method,
        url: String,
        correlation_id: String,
        #[source]
        source: BoxError,
    },
    #[error("http status {status} for {method} {url} [{correlation_id}]: {body}")]
    HttpStatus {
        status: u16,
        body: String,
        method: Method,
        url: String,
        correlation_id: String,
    },
    #[error("failed to decode response json: {source}; body={body}")]
    DeserializeJson {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUrl { .. } => ErrorCode::InvalidUrl,
            Self::SerializeJson { .. } => ErrorCode::SerializeJson,
            Self::SerializeQuery { .. } => ErrorCode::SerializeQuery,
            Self::SerializeForm { .. } => ErrorCode::SerializeForm,
            Self::InvalidHeaderName { .. } => ErrorCode::InvalidHeaderName,
            Self::InvalidHeaderValue { .. } => ErrorCode::InvalidHeaderValue,
            Self::RequestBuild { .. } => ErrorCode::RequestBuild,
            Self::TlsInit { .. } => ErrorCode::TlsInit,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ReadBody { .. } => ErrorCode::ReadBody,
            Self::HttpStatus { .. } => ErrorCode::HttpStatus,
            Self::DeserializeJson { .. } => ErrorCode::DeserializeJson,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { body, .. } | Self::DeserializeJson { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. }
            | Self::Timeout { url, .. }
            | Self::ReadBody { url, .. }
            | Self::HttpStatus { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<&Method> {
        match self {
            Self::Transport { method, .. }
            | Self::Timeout { method, .. }
            | Self::ReadBody { method, .. }
            | Self::HttpStatus { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Transport { correlation_id, .. }
            | Self::Timeout { correlation_id, .. }
            | Self::ReadBody { correlation_id, .. }
            | Self::HttpStatus { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { kind, .. } => is_retryable_transport(*kind),
            Self::Timeout { .. } | Self::ReadBody { .. } => true,
            Self::HttpStatus { status, .. } => is_retryable_status_code(*status),
            _ => false,
        }
    }
}
