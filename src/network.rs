//! Best-effort classification of transport failures.
//!
//! There is no reliable way to tell "the network is down" apart from every
//! other fault a transport can raise. [`NetworkSignatures`] is an allow-list:
//! failures it matches are reported as `network` and may be retried,
//! everything else is `unknown` and terminal.

use crate::fetch::{FetchError, FetchErrorKind};

/// Messages emitted by common fetch implementations when the connection
/// itself fails.
pub const DEFAULT_NETWORK_MESSAGES: &[&str] = &[
    "network error",
    "Failed to fetch",
    "NetworkError when attempting to fetch resource.",
    "The Internet connection appears to be offline.",
    "Network request failed",
    "fetch failed",
    "terminated",
];

/// Too generic to trust on its own; only matches errors without a cause.
pub const DEFAULT_BARE_MESSAGES: &[&str] = &["Load failed"];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Signature {
    Exact(String),
    /// Matches only when the error carries no source chain.
    Bare(String),
}

/// Allow-list of failures considered network errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSignatures {
    kinds: Vec<FetchErrorKind>,
    messages: Vec<Signature>,
}

impl Default for NetworkSignatures {
    fn default() -> Self {
        let mut signatures = Self::empty()
            .with_kind(FetchErrorKind::Connect)
            .with_kind(FetchErrorKind::Timeout)
            .with_kind(FetchErrorKind::Request)
            .with_kind(FetchErrorKind::Body);
        for message in DEFAULT_NETWORK_MESSAGES {
            signatures = signatures.with_message(*message);
        }
        for message in DEFAULT_BARE_MESSAGES {
            signatures = signatures.with_bare_message(*message);
        }
        signatures
    }
}

impl NetworkSignatures {
    /// An allow-list matching nothing.
    pub fn empty() -> Self {
        Self {
            kinds: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: FetchErrorKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Adds a message that must match the error message exactly.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(Signature::Exact(message.into()));
        self
    }

    /// Adds a message that matches only errors without a source.
    pub fn with_bare_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(Signature::Bare(message.into()));
        self
    }

    pub fn is_network(&self, err: &FetchError) -> bool {
        if self.kinds.contains(&err.kind()) {
            return true;
        }
        self.messages.iter().any(|signature| match signature {
            Signature::Exact(message) => message == err.message(),
            Signature::Bare(message) => message == err.message() && !err.has_source(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::NetworkSignatures;
    use crate::fetch::{FetchError, FetchErrorKind};

    fn other(message: &str) -> FetchError {
        FetchError::new(FetchErrorKind::Other, message)
    }

    #[test]
    fn transport_kinds_are_network() {
        let signatures = NetworkSignatures::default();
        assert!(signatures.is_network(&FetchError::new(FetchErrorKind::Connect, "refused")));
        assert!(signatures.is_network(&FetchError::new(FetchErrorKind::Timeout, "slow")));
        assert!(!signatures.is_network(&other("refused")));
    }

    #[test]
    fn exact_messages_are_network() {
        let signatures = NetworkSignatures::default();
        assert!(signatures.is_network(&other("Failed to fetch")));
        assert!(signatures.is_network(&other("fetch failed")));
        assert!(!signatures.is_network(&other("failed to fetch")));
        assert!(!signatures.is_network(&other("Failed to fetch: extra")));
    }

    #[test]
    fn load_failed_requires_bare_error() {
        let signatures = NetworkSignatures::default();
        assert!(signatures.is_network(&other("Load failed")));
        let wrapped = other("Load failed").with_source(std::io::Error::other("inner"));
        assert!(!signatures.is_network(&wrapped));
    }

    #[test]
    fn empty_allow_list_matches_nothing() {
        let signatures = NetworkSignatures::empty();
        assert!(!signatures.is_network(&FetchError::new(FetchErrorKind::Connect, "refused")));
        let custom = signatures.with_message("socket hang up");
        assert!(custom.is_network(&other("socket hang up")));
    }
}
