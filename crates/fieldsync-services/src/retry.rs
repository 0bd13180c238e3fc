//! Bounded retry with linear backoff for object storage transfers.

use fieldsync_core::{SyncConfig, SyncError};
use fieldsync_storage::StorageError;
use std::future::Future;

/// Run `attempt_fn` up to `config.upload_max_attempts` times.
///
/// Attempt `n` (1-based) is preceded by a sleep of `(n - 1) * base`, so the
/// first attempt starts immediately. The last error is surfaced as
/// `SyncError::Transfer`.
pub async fn with_backoff<T, F, Fut>(
    config: &SyncConfig,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, SyncError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = config.upload_max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        let delay = config.backoff_before(attempt);
        if !delay.is_zero() {
            tracing::debug!(
                operation = operation,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }

        match attempt_fn(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation,
                        attempt = attempt,
                        "Transfer succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                tracing::warn!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Transfer attempt failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(SyncError::Transfer {
        attempts: max_attempts,
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "transfer failed".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(attempts: u32) -> SyncConfig {
        SyncConfig {
            upload_max_attempts: attempts,
            upload_backoff_base: Duration::from_millis(1),
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(&fast_config(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::UploadFailed("connection reset".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(SyncError::Transfer { attempts, message }) => {
                assert_eq!(attempts, 3);
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(&fast_config(3), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(StorageError::UploadFailed("flaky".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_linear() {
        let config = SyncConfig {
            upload_max_attempts: 3,
            upload_backoff_base: Duration::from_millis(1000),
            ..SyncConfig::default()
        };
        let started = tokio::time::Instant::now();
        let _: Result<(), _> = with_backoff(&config, "test", |_| async {
            Err(StorageError::UploadFailed("down".into()))
        })
        .await;

        // 0s + 1s + 2s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }
}
