use std::thread;
use std::time::Duration;
use tracing::warn;

use super::FetchError;

/// Bounded attempts with exponentially growing delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay,
            ..Self::default()
        }
    }

    /// A policy that tries once
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.multiplier.saturating_pow(retry))
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        self.run_with_sleep(what, &mut op, thread::sleep)
    }

    fn run_with_sleep<T>(
        &self,
        what: &str,
        op: &mut impl FnMut() -> Result<T, FetchError>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, FetchError> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.attempts => {
                    let delay = self.delay(attempt);
                    warn!(
                        what,
                        attempt = attempt + 1,
                        of = self.attempts,
                        error = %e,
                        "fetch failed, retrying in {:?}",
                        delay
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::client::parse_body;
    use std::io;

    fn transient() -> FetchError {
        FetchError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retries_until_success() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let mut slept = Vec::new();

        let result = policy.run_with_sleep(
            "doc",
            &mut || {
                calls += 1;
                if calls < 3 {
                    Err(transient())
                } else {
                    Ok(calls)
                }
            },
            |d| slept.push(d),
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(slept, [Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn test_truncated_body_is_downloaded_again() {
        let policy = RetryPolicy::default();
        let bodies = [r#"{"zones": {"main_0": {"#, r#"{"zones": {"main_0": {}}}"#];
        let mut calls = 0;
        let mut slept = Vec::new();

        let result = policy.run_with_sleep(
            "zone_table",
            &mut || {
                let body = bodies[calls];
                calls += 1;
                parse_body("http://localhost/zone_table.json", body)
            },
            |d| slept.push(d),
        );

        assert!(result.unwrap()["zones"]["main_0"].is_object());
        assert_eq!(calls, 2);
        assert_eq!(slept, [Duration::from_secs(1)]);
    }

    #[test]
    fn test_gives_up_after_bounded_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(5));
        let mut calls = 0;

        let result: Result<(), _> = policy.run_with_sleep(
            "doc",
            &mut || {
                calls += 1;
                Err(transient())
            },
            |_| {},
        );

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let mut calls = 0;

        let result: Result<(), _> = policy.run_with_sleep(
            "doc",
            &mut || {
                calls += 1;
                Err(FetchError::Status {
                    status: 404,
                    url: "x".into(),
                })
            },
            |_| {},
        );

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
