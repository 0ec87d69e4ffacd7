//! Upstream deadline shared by one forwarded exchange.
//!
//! A single deadline covers waiting for the response head and reading a
//! buffered response body. Streamed request bodies push it back on every
//! chunk, so an upload that keeps making progress is never cut off; the
//! timeout then bounds inactivity rather than total duration.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::http::error::ProxyError;

#[derive(Debug, Clone)]
pub struct Deadline {
    timeout: Duration,
    at: Arc<watch::Sender<Instant>>,
}

impl Deadline {
    /// Start the clock now.
    pub fn new(timeout: Duration) -> Self {
        let (at, _) = watch::channel(Instant::now() + timeout);
        Self {
            timeout,
            at: Arc::new(at),
        }
    }

    /// Record progress: the deadline becomes `timeout` from now.
    pub fn touch(&self) {
        self.at.send_replace(Instant::now() + self.timeout);
    }

    pub fn at(&self) -> Instant {
        *self.at.borrow()
    }

    /// Drive `fut` until it completes or the deadline passes without
    /// further progress.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ProxyError> {
        tokio::pin!(fut);
        loop {
            let at = self.at();
            tokio::select! {
                out = &mut fut => return Ok(out),
                _ = tokio::time::sleep_until(at) => {
                    if self.at() <= at {
                        return Err(ProxyError::Timeout(self.timeout));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expires_without_progress() {
        let deadline = Deadline::new(Duration::from_millis(100));
        let result = deadline
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(ProxyError::Timeout(d)) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_progress_extends_deadline() {
        let deadline = Deadline::new(Duration::from_millis(300));
        let ticker = deadline.clone();
        let progress = tokio::spawn(async move {
            for _ in 0..6 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ticker.touch();
            }
        });

        let result = deadline
            .run(async {
                tokio::time::sleep(Duration::from_millis(700)).await;
                "done"
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        progress.await.unwrap();
    }

    #[tokio::test]
    async fn test_completes_before_deadline() {
        let deadline = Deadline::new(Duration::from_secs(1));
        assert_eq!(deadline.run(async { 7 }).await.unwrap(), 7);
    }
}
