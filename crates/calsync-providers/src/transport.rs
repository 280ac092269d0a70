//! Raw transport: HTTP GET and local file reads.
//!
//! The fetch adapter never talks to the network or the filesystem directly;
//! it goes through a [`Transport`] so tests can substitute canned responses.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A response to an HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Canonical reason phrase, possibly empty.
    pub reason: String,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: String::new(),
            body: body.into(),
        }
    }

    /// Builder method to set the reason phrase.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors from the transport layer itself (before any status handling).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Abstract access to HTTP and the local filesystem.
pub trait Transport: Send + Sync {
    /// Performs a GET with the given extra headers.
    fn http_get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;

    /// Reads a local file.
    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, std::io::Result<Vec<u8>>>;
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use std::path::Path;
    use std::time::Duration;

    use reqwest::Client;
    use tracing::trace;

    use super::{BoxFuture, HttpResponse, Transport, TransportError};

    /// [`Transport`] backed by reqwest and tokio's filesystem.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        /// Default request timeout.
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

        /// Creates a transport with the default timeout.
        pub fn new() -> Result<Self, TransportError> {
            Self::with_timeout(Self::DEFAULT_TIMEOUT)
        }

        /// Creates a transport with a custom request timeout.
        pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(format!("calsync/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| TransportError::new("failed to create HTTP client").with_cause(e))?;
            Ok(Self { client })
        }
    }

    impl Transport for ReqwestTransport {
        fn http_get<'a>(
            &'a self,
            url: &'a str,
            headers: &'a [(String, String)],
        ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            Box::pin(async move {
                let mut request = self.client.get(url);
                for (name, value) in headers {
                    request = request.header(name.as_str(), value.as_str());
                }

                trace!(url = %url, "Sending GET");
                let response = request
                    .send()
                    .await
                    .map_err(|e| TransportError::new(format!("request failed: {}", e)).with_cause(e))?;

                let status = response.status();
                let body = response.text().await.map_err(|e| {
                    TransportError::new(format!("failed to read response: {}", e)).with_cause(e)
                })?;

                Ok(HttpResponse {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or_default().to_string(),
                    body,
                })
            })
        }

        fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, std::io::Result<Vec<u8>>> {
            Box::pin(tokio::fs::read(path))
        }
    }
}
