use std::{collections::BTreeMap, fmt};

use bytes::Bytes;
use reqwest::Method;

use crate::{body::Body, codec::Codec, fetch::RawResponse, ByteStream};

/// One logical API call, consumed by [`ApiClient::request`](crate::ApiClient::request).
///
/// `T` is the request value type and `R` the decoded response type. Use `()`
/// for either side when there is nothing to send or nothing to decode.
pub struct Call<'a, T, R> {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<Body<T>>,
    pub(crate) request_codec: Option<&'a dyn Codec<T>>,
    pub(crate) response_codec: Option<&'a dyn Codec<R>>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) direct_request: bool,
    pub(crate) direct_response: bool,
}

impl<'a, T, R> Call<'a, T, R> {
    /// `path` is appended verbatim to the client endpoint.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            request_codec: None,
            response_codec: None,
            headers: BTreeMap::new(),
            direct_request: false,
            direct_response: false,
        }
    }

    pub fn body(mut self, value: T) -> Self {
        self.body = Some(Body::Value(value));
        self
    }

    pub fn bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Bytes(bytes.into()));
        self
    }

    pub fn stream(mut self, stream: ByteStream) -> Self {
        self.body = Some(Body::Stream(stream));
        self
    }

    pub fn request_codec(mut self, codec: &'a dyn Codec<T>) -> Self {
        self.request_codec = Some(codec);
        self
    }

    pub fn response_codec(mut self, codec: &'a dyn Codec<R>) -> Self {
        self.response_codec = Some(codec);
        self
    }

    /// Adds a per-call header. Per-call headers win over persistent ones.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sends the body as opaque bytes instead of an envelope.
    pub fn direct_request(mut self, direct: bool) -> Self {
        self.direct_request = direct;
        self
    }

    /// Hands back the raw response instead of a decoded value.
    pub fn direct_response(mut self, direct: bool) -> Self {
        self.direct_response = direct;
        self
    }
}

impl<T, R> fmt::Debug for Call<'_, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("request_codec", &self.request_codec.is_some())
            .field("response_codec", &self.response_codec.is_some())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("direct_request", &self.direct_request)
            .field("direct_response", &self.direct_response)
            .finish()
    }
}

/// Successful outcome of a call.
#[derive(Debug)]
pub enum Reply<R> {
    /// Decoded body; `None` when the body was empty and no codec was set.
    Value(Option<R>),
    /// Unread response, for direct-response calls.
    Raw(RawResponse),
}

impl<R> Reply<R> {
    pub fn into_value(self) -> Option<R> {
        match self {
            Self::Value(value) => value,
            Self::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<RawResponse> {
        match self {
            Self::Raw(response) => Some(response),
            Self::Value(_) => None,
        }
    }
}
