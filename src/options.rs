use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Configures retry behavior.
///
/// Partial overrides go through struct-update syntax or, for config files,
/// through serde: missing fields fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound of the exponential backoff, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth of the backoff per attempt. Values below 1 are treated as 1.
    pub backoff_factor: f64,
    /// Methods that are safe to send more than once, upper-case.
    pub idempotent_methods: BTreeSet<String>,
    /// Buffer direct stream bodies up front so they can be replayed.
    pub retry_streams_as_arrays: bool,
    /// Statuses treated as transient.
    pub retryable_status_codes: BTreeSet<u16>,
    /// Flat wait after a 429, in milliseconds.
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_factor: 2.0,
            idempotent_methods: ["GET", "HEAD", "PUT", "DELETE", "OPTIONS", "TRACE", "QUERY"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            retry_streams_as_arrays: false,
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            rate_limit_delay_ms: 10_000,
        }
    }
}

impl RetryOptions {
    /// Never retries anything.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn is_idempotent(&self, method: &Method) -> bool {
        let method = method.as_str();
        self.idempotent_methods
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(method))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

/// Client-wide configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Persistent headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Emits per-attempt debug scopes through the client's logger.
    pub debug: bool,
    /// Per-attempt timeout of the default transport, in milliseconds.
    pub timeout_ms: Option<u64>,
    pub retry: RetryOptions,
}

impl ClientOptions {
    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::{ClientOptions, RetryOptions};

    #[test]
    fn defaults_match_documented_values() {
        let opts = RetryOptions::default();
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.initial_delay_ms, 100);
        assert_eq!(opts.max_delay_ms, 5_000);
        assert_eq!(opts.backoff_factor, 2.0);
        assert!(!opts.retry_streams_as_arrays);
        assert_eq!(opts.rate_limit_delay_ms, 10_000);
        assert_eq!(
            opts.retryable_status_codes.iter().copied().collect::<Vec<_>>(),
            vec![408, 429, 500, 502, 503, 504]
        );
    }

    #[test]
    fn idempotency_check_ignores_case() {
        let opts = RetryOptions::default();
        assert!(opts.is_idempotent(&Method::GET));
        assert!(opts.is_idempotent(&Method::from_bytes(b"query").expect("valid method")));
        assert!(!opts.is_idempotent(&Method::POST));
        assert!(!opts.is_idempotent(&Method::PATCH));
    }

    #[test]
    fn partial_config_merges_over_defaults() {
        let opts: ClientOptions = serde_json::from_str(
            r#"{ "debug": true, "retry": { "max_retries": 1, "rate_limit_delay_ms": 250 } }"#,
        )
        .expect("partial config must parse");
        assert!(opts.debug);
        assert_eq!(opts.retry.max_retries, 1);
        assert_eq!(opts.retry.rate_limit_delay_ms, 250);
        assert_eq!(opts.retry.initial_delay_ms, 100);
        assert!(opts.retry.is_retryable_status(503));
        assert!(opts.headers.is_empty());
    }

    #[test]
    fn disabled_keeps_classification() {
        let opts = RetryOptions::disabled();
        assert_eq!(opts.max_retries, 0);
        assert!(opts.is_retryable_status(429));
    }
}
