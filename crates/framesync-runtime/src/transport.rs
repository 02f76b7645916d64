//! Synchronous request transport.
//!
//! Every remote call the runtime makes goes through [`Transport`]. Calls block
//! the calling thread until the response (or failure) arrives; there is no
//! cancellation and, unless the host opts in, no timeout.
//!
//! An empty response body is a meaningful answer ("use defaults", "no
//! canonical path"), so implementations must return it as `Ok(String::new())`
//! rather than as an error.

use std::fmt;

/// Failure of a remote call.
///
/// `status` is `0` when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub status: u16,
    pub status_text: String,
    /// Response body, if any.
    pub body: String,
}

impl TransportError {
    #[must_use]
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    /// A failure where no response arrived (DNS, refused, aborted).
    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(0, detail, "")
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        self.status == 0
    }
}

impl fmt::Display for TransportError {
    /// `"<body> | <status> <status_text>"`, the text shown to the user.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} {}", self.body, self.status, self.status_text)
    }
}

impl std::error::Error for TransportError {}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Blocking request primitive.
pub trait Transport {
    /// `GET url?query`, returning the response body.
    fn get(&self, url: &str, query: &[(&str, &str)]) -> TransportResult<String>;

    /// `POST url` with a form-encoded body, returning the response body.
    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> TransportResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Transport (requires http feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "http")]
mod http {
    use super::*;
    use reqwest::StatusCode;
    use reqwest::blocking::{Client, Request};
    use std::time::Duration;
    use url::Url;

    /// Blocking HTTP transport for native hosts.
    ///
    /// Endpoint paths such as `/admin/settings/` are resolved against `base`.
    pub struct HttpTransport {
        client: Client,
        base: Url,
    }

    impl HttpTransport {
        /// Transport without a request timeout.
        pub fn new(base: Url) -> TransportResult<Self> {
            Self::with_timeout(base, None)
        }

        /// Transport with an explicit timeout; `None` waits indefinitely.
        pub fn with_timeout(base: Url, timeout: Option<Duration>) -> TransportResult<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError::network(format!("client build failed: {e}")))?;
            Ok(Self { client, base })
        }

        /// Parse `base` and build a transport without a timeout.
        pub fn from_base_str(base: &str) -> TransportResult<Self> {
            let base = Url::parse(base)
                .map_err(|e| TransportError::network(format!("invalid base url: {e}")))?;
            Self::new(base)
        }

        #[must_use]
        pub fn base(&self) -> &Url {
            &self.base
        }

        fn resolve(&self, url: &str) -> TransportResult<Url> {
            self.base
                .join(url)
                .map_err(|e| TransportError::network(format!("invalid url {url:?}: {e}")))
        }

        fn get_request(&self, url: &str, query: &[(&str, &str)]) -> TransportResult<Request> {
            let mut target = self.resolve(url)?;
            if !query.is_empty() {
                target.query_pairs_mut().extend_pairs(query);
            }
            self.client.get(target).build().map_err(build_error)
        }

        fn post_request(&self, url: &str, fields: &[(&str, &str)]) -> TransportResult<Request> {
            let target = self.resolve(url)?;
            self.client.post(target).form(fields).build().map_err(build_error)
        }

        fn execute(&self, request: Request) -> TransportResult<String> {
            tracing::debug!(method = %request.method(), url = %request.url(), "sending");
            let response = self
                .client
                .execute(request)
                .map_err(|e| TransportError::network(e.to_string()))?;
            let status = response.status();
            let text = response
                .text()
                .map_err(|e| TransportError::network(format!("failed to read body: {e}")))?;
            into_result(status, text)
        }
    }

    fn build_error(e: reqwest::Error) -> TransportError {
        TransportError::network(format!("invalid request: {e}"))
    }

    /// Success statuses yield the body, even when empty; anything else is a
    /// [`TransportError`] carrying status, reason phrase and body.
    fn into_result(status: StatusCode, text: String) -> TransportResult<String> {
        if status.is_success() {
            Ok(text)
        } else {
            Err(TransportError::new(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                text,
            ))
        }
    }

    impl Transport for HttpTransport {
        fn get(&self, url: &str, query: &[(&str, &str)]) -> TransportResult<String> {
            let request = self.get_request(url, query)?;
            self.execute(request)
        }

        fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> TransportResult<String> {
            let request = self.post_request(url, fields)?;
            self.execute(request)
        }
    }

    impl fmt::Debug for HttpTransport {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("HttpTransport")
                .field("base", &self.base.as_str())
                .finish()
        }
    }

}

#[cfg(feature = "http")]
pub use http::HttpTransport;
