use uuid::Uuid;

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";
pub(crate) const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub(crate) const DEFAULT_SOURCE: &str = "http-client";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    correlation_id: String,
    source: String,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            source: source.into(),
        }
    }

    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string(), DEFAULT_SOURCE)
    }

    pub fn generate_with_source(source: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), source)
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

pub trait ContextProvider: Send + Sync {
    fn context(&self) -> RequestContext;
}

impl<F> ContextProvider for F
where
    F: Fn() -> RequestContext + Send + Sync,
{
    fn context(&self) -> RequestContext {
        self()
    }
}
