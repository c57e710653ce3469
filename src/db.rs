use std::{fmt::Display, future::Future, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::task::JoinHandle;

use crate::{config::AppConfig, repository::RepoError};

/// How often the live pool is probed.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// RetryPolicy
///
/// Bounded attempts with a fixed delay between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Start-up connection: five attempts, five seconds apart.
    pub const INITIAL_CONNECT: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_secs(5),
    };

    /// Back-off after a live connection is lost. Longer than the start-up delay
    /// and unbounded: the monitor keeps re-checking for the process lifetime.
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(120);
}

/// retry
///
/// Runs `operation` until it succeeds or the policy's attempts are spent, and
/// returns the last error in that case. The attempt number (1-based) is passed in.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                tracing::error!("giving up after {} attempts: {}", attempt, err);
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    "attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    err,
                    policy.delay
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

/// connect
///
/// Opens the Postgres pool under `RetryPolicy::INITIAL_CONNECT`. Exhausting the
/// budget surfaces as `RepoError::Unavailable`.
pub async fn connect(config: &AppConfig) -> Result<PgPool, RepoError> {
    let max_connections = config.db_max_connections;
    retry(RetryPolicy::INITIAL_CONNECT, |attempt| {
        let url = config.db_url.clone();
        async move {
            tracing::debug!("connecting to Postgres (attempt {})", attempt);
            PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&url)
                .await
        }
    })
    .await
    .map_err(|e| RepoError::Unavailable(e.to_string()))
}

/// spawn_connection_monitor
///
/// Pings the pool every `HEALTH_CHECK_INTERVAL`. After a failed ping it waits
/// `RetryPolicy::RECONNECT_DELAY` before checking again; the pool re-opens
/// connections on demand once the database is back.
pub fn spawn_connection_monitor(pool: PgPool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut healthy = true;
        loop {
            let delay = if healthy {
                HEALTH_CHECK_INTERVAL
            } else {
                RetryPolicy::RECONNECT_DELAY
            };
            tokio::time::sleep(delay).await;

            match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) if !healthy => {
                    tracing::info!("Postgres connection restored.");
                    healthy = true;
                }
                Ok(_) => {}
                Err(e) => {
                    healthy = false;
                    tracing::error!("Postgres connection lost: {}", e);
                    tracing::info!(
                        "Re-checking Postgres in {} minutes.",
                        RetryPolicy::RECONNECT_DELAY.as_secs() / 60
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(1),
    };

    #[tokio::test]
    async fn retry_stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(FAST, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry(FAST, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("attempt {attempt} failed")) }
        })
        .await;

        assert_eq!(result, Err("attempt 3 failed".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reconnect_backs_off_longer_than_start_up() {
        assert_eq!(RetryPolicy::INITIAL_CONNECT.max_attempts, 5);
        assert_eq!(RetryPolicy::INITIAL_CONNECT.delay, Duration::from_secs(5));
        assert!(RetryPolicy::RECONNECT_DELAY > RetryPolicy::INITIAL_CONNECT.delay);
    }
}
