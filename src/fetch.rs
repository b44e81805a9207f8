//! Injectable transport.
//!
//! [`ApiClient`](crate::ApiClient) never talks to the network directly: it
//! hands a [`WireRequest`] to a [`Fetch`] implementation and classifies what
//! comes back. [`ReqwestFetch`] is the default.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::{header::HeaderMap, Method};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Chunked request body.
pub type ByteChunks = BoxStream<'static, Result<Bytes, BoxError>>;

/// Fully built request handed to a [`Fetch`] implementation.
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<WireBody>,
    /// Set only when the transport reported credential support.
    pub include_credentials: bool,
}

pub enum WireBody {
    Bytes(Bytes),
    Stream(ByteChunks),
}

impl fmt::Debug for WireBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl fmt::Debug for WireRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .field("body", &self.body)
            .field("include_credentials", &self.include_credentials)
            .finish()
    }
}

/// Response handle as produced by the transport.
///
/// Returned untouched to callers that asked for a direct response; the
/// body has not been read at that point.
pub struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl RawResponse {
    pub fn new(
        status: u16,
        headers: HeaderMap,
        body: BoxStream<'static, Result<Bytes, FetchError>>,
    ) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn from_bytes(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let stream: BoxStream<'static, Result<Bytes, FetchError>> = if body.is_empty() {
            futures::stream::empty().boxed()
        } else {
            futures::stream::once(async move { Ok(body) }).boxed()
        };
        Self::new(status, headers, stream)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, FetchError>> {
        self.body
    }

    /// Reads the whole body into one contiguous buffer.
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Rough origin of a transport failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FetchErrorKind {
    /// The connection could not be established.
    Connect,
    Timeout,
    /// The request failed while being sent.
    Request,
    /// The body failed while being streamed in either direction.
    Body,
    /// Anything else, including local faults.
    Other,
}

/// Failure reported by a [`Fetch`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_connect() {
            FetchErrorKind::Connect
        } else if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if err.is_body() || err.is_decode() {
            FetchErrorKind::Body
        } else if err.is_request() {
            FetchErrorKind::Request
        } else {
            FetchErrorKind::Other
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

/// Fetch-style transport: one call per attempt, no retries of its own.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: WireRequest) -> Result<RawResponse, FetchError>;

    /// Whether the transport understands a credentials mode. Requests only
    /// ask for credentials when this returns `true`.
    fn supports_credentials(&self) -> bool {
        true
    }
}

/// [`Fetch`] implementation over a `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct ReqwestFetch {
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: None,
        }
    }

    /// Applies a per-attempt timeout to every request.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: WireRequest) -> Result<RawResponse, FetchError> {
        let mut builder = self
            .http
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            Some(WireBody::Bytes(bytes)) => builder.body(bytes),
            Some(WireBody::Stream(chunks)) => builder.body(reqwest::Body::wrap_stream(chunks)),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(FetchError::from).boxed();
        Ok(RawResponse::new(status, headers, body))
    }

    // Native reqwest has no credentials mode; cookies belong to the client's
    // cookie store instead.
    fn supports_credentials(&self) -> bool {
        false
    }
}
