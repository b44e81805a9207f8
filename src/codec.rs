//! Envelope encoding.
//!
//! Structured bodies travel as CBOR. A [`Codec`] maps a typed value to and
//! from the self-describing [`Envelope`] before the CBOR step; without one,
//! the value goes through serde directly.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Untyped CBOR value sitting between a [`Codec`] and the wire.
pub type Envelope = ciborium::Value;

/// Media type of envelope-encoded bodies.
pub const ENVELOPE_CONTENT_TYPE: &str = "application/cbor";
/// Media type of direct (raw byte) bodies.
pub const DIRECT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("envelope encode error: {0}")]
    Encode(String),
    #[error("envelope decode error: {0}")]
    Decode(String),
    #[error("field `{0}` is missing or has the wrong type")]
    Field(&'static str),
}

/// Pluggable encode/decode pair attached to a request or response type.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Envelope, CodecError>;
    fn decode(&self, envelope: Envelope) -> Result<T, CodecError>;
}

/// [`Codec`] backed by the type's own serde implementation.
pub struct SerdeCodec<T>(PhantomData<fn() -> T>);

impl<T> SerdeCodec<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for SerdeCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Envelope, CodecError> {
        Envelope::serialized(value).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn decode(&self, envelope: Envelope) -> Result<T, CodecError> {
        envelope
            .deserialized()
            .map_err(|err| CodecError::Decode(err.to_string()))
    }
}

/// Turns a request value into its envelope, through `codec` when present.
pub(crate) fn encode_value<T: Serialize>(
    value: &T,
    codec: Option<&dyn Codec<T>>,
) -> Result<Envelope, CodecError> {
    match codec {
        Some(codec) => codec.encode(value),
        None => Envelope::serialized(value).map_err(|err| CodecError::Encode(err.to_string())),
    }
}

pub(crate) fn to_cbor<S: Serialize + ?Sized>(value: &S) -> Result<Bytes, CodecError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(Bytes::from(buf))
}

pub(crate) fn from_cbor<D: DeserializeOwned>(bytes: &[u8]) -> Result<D, CodecError> {
    ciborium::de::from_reader(bytes).map_err(|err| CodecError::Decode(err.to_string()))
}

/// Decodes a successful response body.
///
/// An empty body without a codec is the absent value (`None`), never an
/// empty buffer. With a codec, an empty body reaches it as `Envelope::Null`.
pub(crate) fn decode_body<R: DeserializeOwned>(
    body: &[u8],
    codec: Option<&dyn Codec<R>>,
) -> Result<Option<R>, CodecError> {
    match codec {
        None if body.is_empty() => Ok(None),
        None => from_cbor(body).map(Some),
        Some(codec) => {
            let envelope = if body.is_empty() {
                Envelope::Null
            } else {
                from_cbor::<Envelope>(body)?
            };
            codec.decode(envelope).map(Some)
        }
    }
}

/// Looks up a text field of a map envelope.
pub fn text_field(envelope: &Envelope, name: &'static str) -> Result<String, CodecError> {
    map_field(envelope, name)
        .and_then(|value| value.as_text())
        .map(str::to_owned)
        .ok_or(CodecError::Field(name))
}

pub(crate) fn map_field<'e>(envelope: &'e Envelope, name: &str) -> Option<&'e Envelope> {
    envelope
        .as_map()?
        .iter()
        .find(|(key, _)| key.as_text() == Some(name))
        .map(|(_, value)| value)
}

/// Builds a map envelope from text-keyed entries.
pub fn map_envelope<I>(entries: I) -> Envelope
where
    I: IntoIterator<Item = (&'static str, Envelope)>,
{
    Envelope::Map(
        entries
            .into_iter()
            .map(|(key, value)| (Envelope::Text(key.to_owned()), value))
            .collect(),
    )
}
