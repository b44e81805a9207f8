use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::Envelope;

/// Discriminant carried by every [`ApiError`].
///
/// The first three variants are produced by the transport itself. Anything
/// else comes verbatim from the server's error envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The caller supplied an unusable input, e.g. a locked stream body.
    InvalidArgument,
    /// A local fault that does not look like a network failure. Never retried.
    Unknown,
    /// The request never reached the server or never got a response.
    Network,
    /// Endpoint-specific code decoded from a non-2xx response.
    Endpoint(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Unknown => "unknown",
            Self::Network => "network",
            Self::Endpoint(code) => code.as_str(),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "invalid_argument" => Self::InvalidArgument,
            "unknown" => Self::Unknown,
            "network" => Self::Network,
            other => Self::Endpoint(other.to_owned()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "invalid_argument" | "unknown" | "network" => Self::from(code.as_str()),
            _ => Self::Endpoint(code),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// Error value returned by every fallible operation of this crate.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// Free-form metadata attached by the server, if any.
    pub meta: Option<BTreeMap<String, Envelope>>,
    /// HTTP status of the response the error was decoded from.
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            meta: None,
            status: None,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_network(&self) -> bool {
        self.code == ErrorCode::Network
    }
}

/// Wire shape of the body attached to every non-2xx response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, Envelope>>,
}

impl ErrorEnvelope {
    pub(crate) fn into_api_error(self, status: u16) -> ApiError {
        ApiError {
            code: ErrorCode::from(self.code),
            message: self.message,
            meta: self.meta,
            status: Some(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, ErrorCode, ErrorEnvelope};

    #[test]
    fn infrastructure_codes_map_onto_fixed_variants() {
        assert_eq!(ErrorCode::from("network"), ErrorCode::Network);
        assert_eq!(
            ErrorCode::from("invalid_argument".to_owned()),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            ErrorCode::from("internal_error"),
            ErrorCode::Endpoint("internal_error".to_owned())
        );
    }

    #[test]
    fn display_uses_wire_code() {
        let err = ApiError::invalid_argument("stream is locked");
        assert_eq!(err.to_string(), "invalid_argument: stream is locked");
    }

    #[test]
    fn envelope_keeps_status_and_meta() {
        let envelope = ErrorEnvelope {
            code: "invalid_credentials".to_owned(),
            message: "invalid email or password".to_owned(),
            meta: None,
        };
        let err = envelope.into_api_error(401);
        assert_eq!(err.code.as_str(), "invalid_credentials");
        assert_eq!(err.status, Some(401));
    }
}
