use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::external::{StrategyRequest, StrategyRunner, StrategyRunnerError};
use crate::models::RecommendationBatch;

/// Bounds for retried strategy invocations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Fixed pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_attempts = std::env::var("JOB_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.max_attempts)
            .max(1);

        let delay_seconds = std::env::var("JOB_RETRY_DELAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.delay.as_secs());

        Self {
            max_attempts,
            delay: Duration::from_secs(delay_seconds),
        }
    }
}

/// All attempts exhausted; carries the error from the last one
#[derive(Debug, Error)]
#[error("strategy invocation failed after {attempts} attempts: {last}")]
pub struct InvokeError {
    pub attempts: u32,

    #[source]
    pub last: StrategyRunnerError,
}

/// Drives runner calls through bounded retries with a fixed delay between
/// attempts. Any runner error is retryable; the first success wins.
pub struct RetryingInvoker {
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Returns the batch and the number of attempts consumed.
    pub async fn invoke(
        &self,
        runner: &dyn StrategyRunner,
        request: &StrategyRequest,
    ) -> Result<(RecommendationBatch, u32), InvokeError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match runner.run(request).await {
                Ok(batch) => {
                    info!(
                        "Strategy '{}' succeeded on attempt {}/{}",
                        request.strategy, attempt, max_attempts
                    );
                    return Ok((batch, attempt));
                }
                Err(e) => {
                    warn!(
                        "Strategy '{}' attempt {}/{} failed: {}",
                        request.strategy, attempt, max_attempts, e
                    );

                    if attempt >= max_attempts {
                        return Err(InvokeError {
                            attempts: attempt,
                            last: e,
                        });
                    }

                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyParams;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// Fails the first `fail_first` calls, then returns an empty batch.
    struct ScriptedRunner {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl ScriptedRunner {
        fn new(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StrategyRunner for ScriptedRunner {
        async fn run(
            &self,
            _request: &StrategyRequest,
        ) -> Result<RecommendationBatch, StrategyRunnerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                Err(StrategyRunnerError::Network("connection refused".into()))
            } else {
                Ok(RecommendationBatch::empty())
            }
        }
    }

    fn request() -> StrategyRequest {
        StrategyRequest {
            strategy: "test_strategy".to_string(),
            job_id: "test_job".to_string(),
            params: StrategyParams {
                symbols: vec!["AAPL".to_string()],
                lookback_days: 30,
                min_confidence: 0.5,
                max_results: 10,
            },
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_one_call() {
        let runner = ScriptedRunner::new(0);
        let invoker = RetryingInvoker::new(fast_policy(3));

        let (_, attempts) = invoker.invoke(&runner, &request()).await.unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let runner = ScriptedRunner::new(2);
        let invoker = RetryingInvoker::new(fast_policy(3));

        let (_, attempts) = invoker.invoke(&runner, &request()).await.unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(runner.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_reports_last_error() {
        let runner = ScriptedRunner::new(u32::MAX);
        let invoker = RetryingInvoker::new(fast_policy(3));

        let err = invoker.invoke(&runner, &request()).await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(runner.calls(), 3);
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(matches!(err.last, StrategyRunnerError::Network(_)));
    }

    #[tokio::test]
    async fn test_zero_attempt_policy_still_tries_once() {
        let runner = ScriptedRunner::new(u32::MAX);
        let invoker = RetryingInvoker::new(fast_policy(0));

        let err = invoker.invoke(&runner, &request()).await.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(runner.calls(), 1);
    }

    /// Collects formatted log lines for assertion.
    #[derive(Clone, Default)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl LogSink {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogSink {
        type Writer = LogSink;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_every_attempt_is_logged_including_first_try_success() {
        let sink = LogSink::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let runner = ScriptedRunner::new(0);
        let invoker = RetryingInvoker::new(fast_policy(3));
        invoker.invoke(&runner, &request()).await.unwrap();

        let logs = sink.contents();
        assert!(
            logs.contains("succeeded on attempt 1/3"),
            "first-try success missing from logs: {}",
            logs
        );

        let runner = ScriptedRunner::new(1);
        invoker.invoke(&runner, &request()).await.unwrap();

        let logs = sink.contents();
        assert!(logs.contains("attempt 1/3 failed"), "logs: {}", logs);
        assert!(logs.contains("succeeded on attempt 2/3"), "logs: {}", logs);
    }
}
