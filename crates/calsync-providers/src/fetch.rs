//! The fetch adapter: raw calendar text for a source.
//!
//! Dispatches on the source URL scheme:
//!
//! - `http`/`https`: GET, with Basic auth when both credentials are set
//! - `file`: read the local file
//! - anything else: [`FetchErrorKind::Unsupported`]
//!
//! No retries happen here. The first failure is returned to the caller.
//!
//! [`FetchErrorKind::Unsupported`]: crate::error::FetchErrorKind::Unsupported

use std::sync::Arc;

use calsync_core::{Scheme, Source};
use tracing::{debug, trace};
use url::Url;

use crate::auth::basic_auth;
use crate::error::{FetchError, FetchResult};
use crate::transport::{BoxFuture, Transport};

/// Anything that can turn a [`Source`] into raw calendar text.
pub trait Fetcher: Send + Sync {
    /// Fetches the raw calendar text for `source`.
    fn fetch<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, FetchResult<String>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, FetchResult<String>> {
        (**self).fetch(source)
    }
}

/// The standard [`Fetcher`], generic over its transport.
#[derive(Debug, Clone)]
pub struct SourceFetcher<T> {
    transport: T,
}

impl<T: Transport> SourceFetcher<T> {
    /// Creates a fetcher on top of `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn fetch_http(&self, source: &Source) -> FetchResult<String> {
        let mut headers = Vec::new();
        if let Some((username, password)) = source.credentials() {
            headers.push(("Authorization".to_string(), basic_auth(username, password)));
        }

        let response = self
            .transport
            .http_get(&source.url, &headers)
            .await
            .map_err(|e| FetchError::network(e.to_string()).with_cause(e))?;

        trace!(status = response.status, bytes = response.body.len(), "Received response");

        if !response.is_success() {
            return Err(FetchError::http(response.status, &response.reason));
        }
        Ok(response.body)
    }

    async fn fetch_file(&self, source: &Source) -> FetchResult<String> {
        let path = Url::parse(&source.url)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| FetchError::file(format!("invalid file URL `{}`", source.url)))?;

        let bytes = self.transport.read_file(&path).await.map_err(|e| {
            FetchError::file(format!("cannot read {}: {}", path.display(), e)).with_cause(e)
        })?;

        String::from_utf8(bytes).map_err(|e| {
            FetchError::file(format!("{} is not valid UTF-8", path.display())).with_cause(e)
        })
    }
}

impl<T: Transport> Fetcher for SourceFetcher<T> {
    fn fetch<'a>(&'a self, source: &'a Source) -> BoxFuture<'a, FetchResult<String>> {
        Box::pin(async move {
            let scheme = source.scheme();
            debug!(source = %source.label(), scheme = %scheme, "Fetching source");

            let result = match scheme {
                Scheme::Http | Scheme::Https => self.fetch_http(source).await,
                Scheme::File => self.fetch_file(source).await,
                Scheme::Unsupported => Err(FetchError::unsupported(format!(
                    "unsupported URL `{}`",
                    source.url
                ))),
            };
            result.map_err(|e| e.with_source_label(source.label()))
        })
    }
}
