use std::time::Duration;

use rand::Rng;

use crate::RetryOptions;

/// Jitter multiplier range applied to exponential backoff.
pub const JITTER: std::ops::Range<f64> = 0.8..1.2;

/// Truncated exponential delay for `attempt` (0 = first attempt), without jitter.
pub fn exponential_delay(options: &RetryOptions, attempt: u32) -> Duration {
    let factor = options.backoff_factor.max(1.0);
    let exp = attempt.min(i32::MAX as u32) as i32;
    let delay_ms = (options.initial_delay_ms as f64 * factor.powi(exp)).min(options.max_delay_ms as f64);
    Duration::from_millis(delay_ms as u64)
}

/// Wait before the attempt following `attempt`.
///
/// A 429 waits the flat rate-limit delay. Anything else waits the
/// exponential delay scaled by a jitter factor drawn from [`JITTER`].
pub fn retry_delay(
    options: &RetryOptions,
    attempt: u32,
    rate_limited: bool,
    rng: &mut impl Rng,
) -> Duration {
    if rate_limited {
        return options.rate_limit_delay();
    }
    exponential_delay(options, attempt).mul_f64(rng.random_range(JITTER))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::{exponential_delay, retry_delay};
    use crate::RetryOptions;

    #[test]
    fn exponential_grows_then_caps() {
        let opts = RetryOptions::default();
        assert_eq!(exponential_delay(&opts, 0), Duration::from_millis(100));
        assert_eq!(exponential_delay(&opts, 1), Duration::from_millis(200));
        assert_eq!(exponential_delay(&opts, 3), Duration::from_millis(800));
        assert_eq!(exponential_delay(&opts, 10), Duration::from_millis(5_000));
        assert_eq!(exponential_delay(&opts, u32::MAX), Duration::from_millis(5_000));
    }

    #[test]
    fn factor_below_one_does_not_shrink() {
        let opts = RetryOptions {
            backoff_factor: 0.5,
            ..RetryOptions::default()
        };
        assert_eq!(exponential_delay(&opts, 4), Duration::from_millis(100));
    }

    #[test]
    fn jittered_delay_stays_in_bounds() {
        let opts = RetryOptions::default();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..8 {
            let base = exponential_delay(&opts, attempt);
            for _ in 0..64 {
                let delay = retry_delay(&opts, attempt, false, &mut rng);
                assert!(delay >= base.mul_f64(0.8), "{delay:?} < 0.8 x {base:?}");
                assert!(delay <= base.mul_f64(1.2), "{delay:?} > 1.2 x {base:?}");
            }
        }
    }

    #[test]
    fn rate_limit_is_flat() {
        let opts = RetryOptions {
            rate_limit_delay_ms: 750,
            ..RetryOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        for attempt in [0, 1, 5, 30] {
            assert_eq!(
                retry_delay(&opts, attempt, true, &mut rng),
                Duration::from_millis(750)
            );
        }
    }
}
