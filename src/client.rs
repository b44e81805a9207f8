use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::sleep;

use crate::{
    backoff,
    body::{self, Body},
    codec::{self, Codec, Envelope, DIRECT_CONTENT_TYPE, ENVELOPE_CONTENT_TYPE},
    error::ErrorEnvelope,
    fetch::{Fetch, FetchError, RawResponse, ReqwestFetch, WireBody, WireRequest},
    logger::{DebugLogger, LogScope, TracingLogger},
    network::NetworkSignatures,
    ApiError, ByteStream, Call, ClientOptions, Reply, Result, RetryOptions,
};

/// Headers sent with every request, lowest precedence.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[(
    "user-agent",
    concat!("regulation-client/", env!("CARGO_PKG_VERSION")),
)];

const REDACTED_HEADERS: &[&str] = &["authorization", "cookie", "proxy-authorization"];

/// Envelope map keys whose values never reach the debug log.
const REDACTED_FIELDS: &[&str] = &["password", "token", "secret"];

#[derive(Clone)]
/// HTTP transport shared by every endpoint wrapper of the Regulation API.
///
/// Clones share the persistent header set.
pub struct ApiClient {
    endpoint: String,
    fetch: Arc<dyn Fetch>,
    custom_fetch: bool,
    logger: Arc<dyn DebugLogger>,
    network: NetworkSignatures,
    options: ClientOptions,
    headers: Arc<RwLock<BTreeMap<String, String>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<String, String> = self
            .read_headers()
            .iter()
            .map(|(name, value)| (name.clone(), redact(name, value).to_owned()))
            .collect();
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint)
            .field("headers", &headers)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Request body once validated and, for buffered streams, drained.
enum Payload {
    Envelope(Envelope),
    Bytes(Bytes),
    Stream(ByteStream),
}

impl Payload {
    fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    fn describe(&self) -> String {
        match self {
            Self::Envelope(envelope) => render_envelope(envelope),
            Self::Bytes(bytes) => format!("{} bytes", bytes.len()),
            Self::Stream(_) => "stream".to_owned(),
        }
    }
}

/// State of a single attempt. Built fresh inside the retry loop and
/// consumed by the attempt, which closes its log scope.
struct RequestContext<'c> {
    method: &'c Method,
    path: &'c str,
    payload: Option<&'c Payload>,
    headers: &'c BTreeMap<String, String>,
    direct_request: bool,
    direct_response: bool,
    idempotent: bool,
    attempt: u32,
    scope: LogScope,
}

enum Attempt<R> {
    Done(Result<Reply<R>>),
    Retry { error: ApiError, delay: Duration },
}

impl ApiClient {
    /// Creates a client for `endpoint`, e.g. `"https://api.example.com"`.
    ///
    /// Request paths are appended verbatim, so the endpoint should not end
    /// with a slash when paths start with one.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            fetch: Arc::new(ReqwestFetch::new()),
            custom_fetch: false,
            logger: Arc::new(TracingLogger::new()),
            network: NetworkSignatures::default(),
            options: ClientOptions::default(),
            headers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `REGULATION_API_URL`: API endpoint (required)
    /// - `REGULATION_API_DEBUG`: `1`/`true` enables debug scopes
    pub fn from_env() -> std::result::Result<Self, String> {
        let url = std::env::var("REGULATION_API_URL")
            .map_err(|_| "missing REGULATION_API_URL environment variable".to_owned())?;
        if url.trim().is_empty() {
            return Err("REGULATION_API_URL is set but empty".to_owned());
        }
        let debug = std::env::var("REGULATION_API_DEBUG")
            .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);
        Ok(Self::new(url.trim()).with_options(ClientOptions {
            debug,
            ..ClientOptions::default()
        }))
    }

    /// Applies client options. Replaces the persistent header set with
    /// `opts.headers`.
    pub fn with_options(mut self, mut opts: ClientOptions) -> Self {
        self.headers = Arc::new(RwLock::new(std::mem::take(&mut opts.headers)));
        if !self.custom_fetch {
            self.fetch = Arc::new(ReqwestFetch::new().with_timeout(opts.timeout()));
        }
        self.options = opts;
        self
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.options.retry = retry;
        self
    }

    /// Replaces the transport, e.g. with a scripted one in tests.
    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = fetch;
        self.custom_fetch = true;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn DebugLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_network_signatures(mut self, network: NetworkSignatures) -> Self {
        self.network = network;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sets or replaces a persistent header.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.write_headers().insert(name.into(), value.into());
    }

    /// Merges `headers` into the persistent set; later values win.
    pub fn set_headers<I, K, V>(&self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.write_headers()
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    pub fn remove_header(&self, name: &str) {
        self.write_headers().remove(name);
    }

    pub fn clear_headers(&self) {
        self.write_headers().clear();
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.read_headers().get(name).cloned()
    }

    /// Snapshot of the persistent headers.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.read_headers().clone()
    }

    /// Executes `call`, retrying transient failures when that is safe.
    ///
    /// Only idempotent methods are retried, and never when the body is an
    /// unbuffered stream. A 429 waits the flat rate-limit delay; other
    /// retryable failures wait a jittered exponential backoff. When retries
    /// run out, the last error is returned.
    pub async fn request<T, R>(&self, call: Call<'_, T, R>) -> Result<Reply<R>>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let Call {
            method,
            path,
            body,
            request_codec,
            response_codec,
            headers,
            direct_request,
            direct_response,
        } = call;

        let payload = self
            .prepare_body(body, request_codec, direct_request)
            .await?;

        let retry = &self.options.retry;
        let idempotent = retry.is_idempotent(&method);
        let max_attempt = if idempotent { retry.max_retries } else { 0 };
        let mut last_error = None;

        for attempt in 0..=max_attempt {
            let ctx = RequestContext {
                method: &method,
                path: &path,
                payload: payload.as_ref(),
                headers: &headers,
                direct_request,
                direct_response,
                idempotent,
                attempt,
                scope: self.open_scope(&method, &path, attempt),
            };

            match self.attempt(ctx, response_codec).await {
                Attempt::Done(result) => return result,
                Attempt::Retry { error, delay } => {
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        code = %error.code,
                        "retrying {method} {path}"
                    );
                    last_error = Some(error);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::unknown("retry budget exhausted")))
    }

    async fn prepare_body<T: Serialize>(
        &self,
        body: Option<Body<T>>,
        codec: Option<&dyn Codec<T>>,
        direct_request: bool,
    ) -> Result<Option<Payload>> {
        let Some(body) = body else {
            return Ok(None);
        };

        let payload = match (body, direct_request) {
            (Body::Value(value), false) => codec::encode_value(&value, codec)
                .map(Payload::Envelope)
                .map_err(|err| ApiError::unknown(err.to_string()))?,
            (Body::Value(_), true) => {
                return Err(ApiError::invalid_argument(
                    "direct requests need a byte or stream body",
                ))
            }
            (Body::Bytes(bytes), false) => Payload::Envelope(Envelope::Bytes(bytes.to_vec())),
            (Body::Bytes(bytes), true) => Payload::Bytes(bytes),
            (Body::Stream(_), false) => {
                return Err(ApiError::invalid_argument(
                    "stream bodies need a direct request",
                ))
            }
            (Body::Stream(stream), true) => self.preprocess_stream(stream).await?,
        };
        Ok(Some(payload))
    }

    /// Rejects locked streams and, when configured, buffers the stream so
    /// it can be replayed on retry.
    async fn preprocess_stream(&self, stream: ByteStream) -> Result<Payload> {
        if stream.is_locked() {
            return Err(ApiError::invalid_argument("stream is locked"));
        }
        if !self.options.retry.retry_streams_as_arrays {
            return Ok(Payload::Stream(stream));
        }
        let chunks = stream
            .take()
            .ok_or_else(|| ApiError::invalid_argument("stream is locked"))?;
        body::drain(chunks)
            .await
            .map(Payload::Bytes)
            .map_err(|err| ApiError::invalid_argument(format!("failed to read stream: {err}")))
    }

    async fn attempt<R: DeserializeOwned>(
        &self,
        ctx: RequestContext<'_>,
        codec: Option<&dyn Codec<R>>,
    ) -> Attempt<R> {
        let request = match self.build_request(&ctx) {
            Ok(request) => request,
            Err(err) => {
                self.log_local_error(&ctx, "request", &err);
                ctx.scope.end();
                return Attempt::Done(Err(err));
            }
        };
        self.log_request(&ctx, &request);

        let response = match self.fetch.fetch(request).await {
            Ok(response) => response,
            Err(err) => return self.on_fetch_error(ctx, err),
        };

        if response.is_success() {
            self.on_success(ctx, response, codec).await
        } else {
            self.on_error_response(ctx, response).await
        }
    }

    fn build_request(&self, ctx: &RequestContext<'_>) -> Result<WireRequest> {
        let url = format!("{}{}", self.endpoint, ctx.path);
        let content_type = if ctx.direct_request {
            DIRECT_CONTENT_TYPE
        } else {
            ENVELOPE_CONTENT_TYPE
        };

        // Increasing precedence; later inserts replace earlier ones.
        let persistent = self.headers();
        let mut merged: Vec<(&str, &str)> = DEFAULT_HEADERS.to_vec();
        merged.push(("content-type", content_type));
        merged.extend(persistent.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        merged.extend(ctx.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let mut headers = HeaderMap::new();
        for (raw_name, raw_value) in merged {
            let name = HeaderName::from_bytes(raw_name.as_bytes()).map_err(|err| {
                ApiError::invalid_argument(format!("invalid header name {raw_name:?}: {err}"))
            })?;
            let value = HeaderValue::from_str(raw_value).map_err(|err| {
                ApiError::invalid_argument(format!("invalid value for header {raw_name:?}: {err}"))
            })?;
            headers.insert(name, value);
        }

        let body = match ctx.payload {
            None => None,
            Some(Payload::Envelope(envelope)) => Some(WireBody::Bytes(
                codec::to_cbor(envelope).map_err(|err| ApiError::unknown(err.to_string()))?,
            )),
            Some(Payload::Bytes(bytes)) => Some(WireBody::Bytes(bytes.clone())),
            Some(Payload::Stream(stream)) => Some(WireBody::Stream(
                stream
                    .take()
                    .ok_or_else(|| ApiError::invalid_argument("stream is locked"))?,
            )),
        };

        Ok(WireRequest {
            method: ctx.method.clone(),
            url,
            headers,
            body,
            include_credentials: self.fetch.supports_credentials(),
        })
    }

    async fn on_success<R: DeserializeOwned>(
        &self,
        ctx: RequestContext<'_>,
        response: RawResponse,
        codec: Option<&dyn Codec<R>>,
    ) -> Attempt<R> {
        let status = response.status();
        if ctx.direct_response {
            self.log_success(&ctx, status, "raw response (unread)".to_owned());
            ctx.scope.end();
            return Attempt::Done(Ok(Reply::Raw(response)));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return self.on_fetch_error(ctx, err),
        };

        match codec::decode_body(&body, codec) {
            Ok(value) => {
                if ctx.scope.is_enabled() {
                    self.log_success(&ctx, status, describe_body(&body));
                }
                ctx.scope.end();
                Attempt::Done(Ok(Reply::Value(value)))
            }
            Err(err) => {
                self.log_local_error(&ctx, "codec", &err);
                ctx.scope.end();
                Attempt::Done(Err(ApiError::unknown(err.to_string()).with_status(status)))
            }
        }
    }

    async fn on_error_response<R>(&self, ctx: RequestContext<'_>, response: RawResponse) -> Attempt<R> {
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return self.on_fetch_error(ctx, err),
        };
        let error = decode_error(status, &body);

        ctx.scope.log(
            "Error Response",
            &[("status", status.to_string()), ("error", error.to_string())],
        );

        if self.options.retry.is_retryable_status(status) && self.can_retry(&ctx) {
            let delay = self.retry_delay(ctx.attempt, status == 429);
            ctx.scope
                .log("Retrying", &[("delay_ms", delay.as_millis().to_string())]);
            ctx.scope.end_timer("Duration");
            ctx.scope.end();
            return Attempt::Retry { error, delay };
        }

        ctx.scope.end_timer("Duration");
        ctx.scope.end();
        Attempt::Done(Err(error))
    }

    fn on_fetch_error<R>(&self, ctx: RequestContext<'_>, err: FetchError) -> Attempt<R> {
        if !self.network.is_network(&err) {
            self.log_local_error(&ctx, &format!("{:?}", err.kind()), &err);
            ctx.scope.end();
            return Attempt::Done(Err(ApiError::unknown(err.to_string())));
        }

        let error = ApiError::network(err.to_string());
        let delay = self
            .can_retry(&ctx)
            .then(|| self.retry_delay(ctx.attempt, false));
        self.log_network_error(&ctx, &err, delay);
        ctx.scope.end();

        match delay {
            Some(delay) => Attempt::Retry { error, delay },
            None => Attempt::Done(Err(error)),
        }
    }

    fn can_retry(&self, ctx: &RequestContext<'_>) -> bool {
        ctx.idempotent
            && ctx.attempt < self.options.retry.max_retries
            && !ctx.payload.is_some_and(Payload::is_stream)
    }

    fn retry_reason(&self, ctx: &RequestContext<'_>) -> &'static str {
        if !ctx.idempotent {
            "non-idempotent method"
        } else if ctx.payload.is_some_and(Payload::is_stream) {
            "stream body cannot be replayed"
        } else {
            "max retries exceeded"
        }
    }

    fn retry_delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        backoff::retry_delay(&self.options.retry, attempt, rate_limited, &mut rand::rng())
    }

    fn open_scope(&self, method: &Method, path: &str, attempt: u32) -> LogScope {
        if !self.options.debug {
            return LogScope::disabled();
        }
        let label = if attempt == 0 {
            format!("{method} {path}")
        } else {
            format!(
                "{method} {path} (retry {attempt}/{})",
                self.options.retry.max_retries
            )
        };
        LogScope::open(&self.logger, &label)
    }

    fn attempt_label(&self, ctx: &RequestContext<'_>) -> String {
        format!(
            "{}/{}",
            ctx.attempt.saturating_add(1),
            self.options.retry.max_retries.saturating_add(1)
        )
    }

    fn log_request(&self, ctx: &RequestContext<'_>, request: &WireRequest) {
        if !ctx.scope.is_enabled() {
            return;
        }
        ctx.scope.start_timer("Duration");
        let mut fields = vec![
            ("url", request.url.clone()),
            ("headers", render_headers(&request.headers)),
        ];
        if let Some(payload) = ctx.payload {
            fields.push(("body", payload.describe()));
        }
        ctx.scope.log("Request Details", &fields);
    }

    fn log_success(&self, ctx: &RequestContext<'_>, status: u16, response: String) {
        ctx.scope.log(
            "Success Response",
            &[("status", status.to_string()), ("response", response)],
        );
        ctx.scope.end_timer("Duration");
    }

    fn log_network_error(&self, ctx: &RequestContext<'_>, err: &FetchError, delay: Option<Duration>) {
        if !ctx.scope.is_enabled() {
            return;
        }
        let mut fields = vec![
            ("method", ctx.method.to_string()),
            ("path", ctx.path.to_owned()),
            ("attempt", self.attempt_label(ctx)),
            ("error_type", format!("{:?}", err.kind())),
            ("error_message", err.message().to_owned()),
        ];
        if let Some(cause) = render_causes(err) {
            fields.push(("error_cause", cause));
        }
        match delay {
            Some(delay) => {
                fields.push(("will_retry", "yes".to_owned()));
                fields.push(("retry_delay_ms", delay.as_millis().to_string()));
            }
            None => {
                fields.push(("will_retry", "no".to_owned()));
                fields.push(("reason", self.retry_reason(ctx).to_owned()));
            }
        }
        ctx.scope.log("Network Error", &fields);
        ctx.scope.end_timer("Duration");
    }

    fn log_local_error(
        &self,
        ctx: &RequestContext<'_>,
        error_type: &str,
        err: &(dyn std::error::Error + 'static),
    ) {
        if !ctx.scope.is_enabled() {
            return;
        }
        let mut fields = vec![
            ("method", ctx.method.to_string()),
            ("path", ctx.path.to_owned()),
            ("attempt", self.attempt_label(ctx)),
            ("error_type", error_type.to_owned()),
            ("error_message", err.to_string()),
        ];
        if let Some(cause) = render_causes(err) {
            fields.push(("error_cause", cause));
        }
        ctx.scope.log("Unknown Error", &fields);
        ctx.scope.end_timer("Duration");
    }

    fn read_headers(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.headers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_headers(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.headers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Turns a non-2xx body into an error. Bodies that are empty or not an
/// error envelope still yield an error carrying the status.
fn decode_error(status: u16, body: &[u8]) -> ApiError {
    if body.is_empty() {
        return ApiError::unknown(format!("http status {status}")).with_status(status);
    }
    match codec::from_cbor::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.into_api_error(status),
        Err(_) => ApiError::unknown(format!("http status {status}: undecodable error body"))
            .with_status(status),
    }
}

fn describe_body(body: &[u8]) -> String {
    if body.is_empty() {
        return "No content".to_owned();
    }
    match codec::from_cbor::<Envelope>(body) {
        Ok(envelope) => render_envelope(&envelope),
        Err(_) => format!("{} bytes", body.len()),
    }
}

fn render_envelope(envelope: &Envelope) -> String {
    let redacted = redact_envelope(envelope);
    serde_json::to_string(&redacted).unwrap_or_else(|_| format!("{redacted:?}"))
}

fn redact_envelope(envelope: &Envelope) -> Envelope {
    match envelope {
        Envelope::Map(entries) => Envelope::Map(
            entries
                .iter()
                .map(|(key, value)| {
                    let secret = key.as_text().is_some_and(|name| {
                        REDACTED_FIELDS
                            .iter()
                            .any(|field| field.eq_ignore_ascii_case(name))
                    });
                    let value = if secret {
                        Envelope::Text("<redacted>".to_owned())
                    } else {
                        redact_envelope(value)
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Envelope::Array(items) => Envelope::Array(items.iter().map(redact_envelope).collect()),
        Envelope::Tag(tag, inner) => Envelope::Tag(*tag, Box::new(redact_envelope(inner))),
        other => other.clone(),
    }
}

fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            format!("{name}: {}", redact(name.as_str(), value))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_causes(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    (!causes.is_empty()).then(|| causes.join(": "))
}

fn redact<'v>(name: &str, value: &'v str) -> &'v str {
    if REDACTED_HEADERS
        .iter()
        .any(|redacted| redacted.eq_ignore_ascii_case(name))
    {
        "<redacted>"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{decode_error, redact, render_envelope, ApiClient};
    use crate::{
        codec::{map_envelope, to_cbor},
        error::ErrorEnvelope,
        Envelope, ErrorCode,
    };

    #[test]
    fn header_round_trip() {
        let client = ApiClient::new("http://api");
        client.set_header("X-Trace", "v");
        assert_eq!(client.header("X-Trace").as_deref(), Some("v"));

        client.remove_header("X-Trace");
        assert_eq!(client.header("X-Trace"), None);
    }

    #[test]
    fn snapshot_is_detached() {
        let client = ApiClient::new("http://api");
        client.set_headers([("A", "1"), ("B", "2")]);
        let mut snapshot = client.headers();
        snapshot.insert("A".to_owned(), "changed".to_owned());
        snapshot.remove("B");

        assert_eq!(client.header("A").as_deref(), Some("1"));
        assert_eq!(client.header("B").as_deref(), Some("2"));
    }

    #[test]
    fn bulk_set_merges_and_clear_empties() {
        let client = ApiClient::new("http://api");
        client.set_headers([("A", "1"), ("B", "2")]);
        client.set_headers([("B", "3"), ("C", "4")]);

        let expected: BTreeMap<String, String> = [("A", "1"), ("B", "3"), ("C", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        assert_eq!(client.headers(), expected);

        client.clear_headers();
        assert!(client.headers().is_empty());
    }

    #[test]
    fn clones_share_persistent_headers() {
        let client = ApiClient::new("http://api");
        let clone = client.clone();
        clone.set_header("Authorization", "Bearer abc");
        assert_eq!(client.header("Authorization").as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = ApiClient::new("http://api");
        client.set_header("Authorization", "Bearer secret-token");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
        assert_eq!(redact("x-request-id", "42"), "42");
    }

    #[test]
    fn error_body_decodes_envelope() {
        let body = to_cbor(&ErrorEnvelope {
            code: "internal_error".to_owned(),
            message: "boom".to_owned(),
            meta: None,
        })
        .expect("envelope must encode");
        let err = decode_error(500, &body);
        assert_eq!(err.code, ErrorCode::Endpoint("internal_error".to_owned()));
        assert_eq!(err.message, "boom");
        assert_eq!(err.status, Some(500));
    }

    #[test]
    fn empty_or_garbage_error_body_keeps_status() {
        let empty = decode_error(503, &[]);
        assert_eq!(empty.code, ErrorCode::Unknown);
        assert_eq!(empty.status, Some(503));

        let garbage = decode_error(502, b"<html>bad gateway</html>");
        assert_eq!(garbage.code, ErrorCode::Unknown);
        assert_eq!(garbage.status, Some(502));
    }

    #[test]
    fn rendered_envelope_hides_secret_fields() {
        let envelope = map_envelope([
            ("email", Envelope::Text("kit@example.com".to_owned())),
            ("password", Envelope::Text("hunter2".to_owned())),
            (
                "nested",
                map_envelope([("Token", Envelope::Text("abc123".to_owned()))]),
            ),
        ]);
        let rendered = render_envelope(&envelope);
        assert!(rendered.contains("kit@example.com"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("abc123"));
        assert_eq!(rendered.matches("<redacted>").count(), 2);
    }
}
