//! `outcall` is a resilient HTTP client for calling third-party services.
//!
//! Every integration constructs its own client with its own base URL and
//! dependency name; the client retries transient failures with exponential
//! backoff, threads one correlation id through all attempts of a logical
//! call, and emits structured, secret-redacted log entries for the final
//! outcome.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use outcall::prelude::{Client, RetryPolicy};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct HygieneRating {
//!     rating: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder("https://api.ratings.food.gov.uk")
//!         .dependency_name("fsa")
//!         .timeout(Duration::from_secs(3))
//!         .retry_policy(
//!             RetryPolicy::standard()
//!                 .max_retries(2)
//!                 .base_delay(Duration::from_millis(50))
//!                 .backoff_factor(2.0),
//!         )
//!         .build()?;
//!
//!     let rating: HygieneRating = client
//!         .get("/establishments/123")
//!         .try_header("x-api-version", "2")?
//!         .send_json()
//!         .await?;
//!
//!     println!("rating={}", rating.rating);
//!     Ok(())
//! }
//! ```
//!
//! # Behavior
//!
//! - Statuses {408, 425, 429, 500, 502, 503, 504} and timeout/DNS/connect/read
//!   transport failures are retried up to `max_retries` extra attempts; delays
//!   follow `base_delay * backoff_factor^attempt` with no jitter.
//! - The correlation id is sent in both `x-request-id` and `x-correlation-id`
//!   and stays constant across all retries of one logical call. Without a
//!   caller-supplied [`RequestContext`], the client's context provider
//!   fabricates a fresh uuid per logical call.
//! - Log entries never contain secrets: header values whose names contain
//!   token/key/secret/password/authorization/cookie/set-cookie/session and
//!   matching url query values are replaced with `[REDACTED]`. The wire
//!   request is never altered.
//! - Terminal failures surface as one [`Error`] carrying status, body,
//!   method, redacted url, and correlation id.

mod client;
mod context;
mod error;
mod redact;
mod request;
mod response;
mod retry;
mod util;

pub use crate::client::{Client, ClientBuilder};
pub use crate::context::{ContextProvider, RequestContext};
pub use crate::error::{Error, ErrorCode, TransportErrorKind};
pub use crate::request::RequestBuilder;
pub use crate::response::Response;
pub use crate::retry::RetryPolicy;

pub type OutcallResult<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Client, ContextProvider, Error, ErrorCode, OutcallResult, RequestContext, Response,
        RetryPolicy, TransportErrorKind,
    };
}

#[cfg(test)]
mod tests;
