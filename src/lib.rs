//! `regulation-client` is the async HTTP transport of the Regulation API SDK.
//!
//! Every endpoint call goes through [`ApiClient::request`], which:
//! - encodes structured bodies as CBOR envelopes (or sends raw bytes/streams),
//! - retries transient failures of idempotent methods with jittered
//!   exponential backoff and a flat delay after `429`,
//! - normalizes every failure into an [`ApiError`] with an [`ErrorCode`],
//! - optionally groups per-attempt debug output through a [`DebugLogger`].
//!
//! Typed wrappers such as [`AccountApi`] sit on top of it.

mod account;
mod backoff;
mod body;
mod call;
mod client;
mod codec;
mod error;
mod fetch;
mod logger;
mod network;
mod options;

pub use account::{
    AccountApi, LoginRequest, LoginRequestCodec, SignupRequest, SignupRequestCodec, UserResponse,
    UserResponseCodec,
};
pub use backoff::{exponential_delay, retry_delay, JITTER};
pub use body::{Body, ByteStream};
pub use call::{Call, Reply};
pub use client::{ApiClient, DEFAULT_HEADERS};
pub use codec::{
    map_envelope, text_field, Codec, CodecError, Envelope, SerdeCodec, DIRECT_CONTENT_TYPE,
    ENVELOPE_CONTENT_TYPE,
};
pub use error::{ApiError, ErrorCode, ErrorEnvelope};
pub use fetch::{
    BoxError, ByteChunks, Fetch, FetchError, FetchErrorKind, RawResponse, ReqwestFetch, WireBody,
    WireRequest,
};
pub use logger::{DebugLogger, LogScope, ScopeId, TracingLogger};
pub use network::{NetworkSignatures, DEFAULT_BARE_MESSAGES, DEFAULT_NETWORK_MESSAGES};
pub use options::{ClientOptions, RetryOptions};

// Re-exported so callers can build calls without depending on reqwest.
pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, ApiError>;
