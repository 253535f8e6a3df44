//! Chunked bulk resolution.
//!
//! Registries throttle aggressively, so a batch is not fired all at once.
//! The scheduler resolves the list in chunks: every domain in a chunk runs
//! concurrently, chunks run one after another with a pause in between, and
//! the chunk size adapts to how well the previous chunk went.
//!
//! Cancellation is cooperative. The token is checked before each chunk and
//! cuts the inter-chunk pause short; a chunk that has started always
//! finishes, so every outcome in the report is complete.

use crate::progress::ProgressTracker;
use crate::resolver::Resolver;
use crate::types::ResolutionOutcome;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Largest chunk the scheduler will grow to.
pub const MAX_CHUNK_SIZE: usize = 20;
/// Smallest chunk the scheduler will shrink to.
pub const MIN_CHUNK_SIZE: usize = 3;
const CHUNK_STEP: usize = 2;

/// Size of the first chunk for a job of `total` domains.
pub fn initial_chunk_size(total: usize) -> usize {
    if total <= 5 {
        total
    } else if total <= 10 {
        5
    } else {
        10
    }
}

/// Size of the next chunk given the previous chunk's success rate.
///
/// Above 0.9 grows by 2 (up to 20); below 0.7 shrinks by 2 (down to 3).
pub fn next_chunk_size(current: usize, success_rate: f64) -> usize {
    if success_rate > 0.9 {
        (current + CHUNK_STEP).min(MAX_CHUNK_SIZE)
    } else if success_rate < 0.7 {
        current.saturating_sub(CHUNK_STEP).max(MIN_CHUNK_SIZE)
    } else {
        current
    }
}

/// A bulk resolution request.
///
/// Domains are kept as entered; each one is validated when it is resolved
/// so bad input turns into a failed outcome rather than a rejected job.
#[derive(Debug)]
pub struct BatchJob {
    domains: Vec<String>,
    chunk_index: usize,
    chunk_size: usize,
    progress: ProgressTracker,
}

impl BatchJob {
    /// Create a job and its progress tracker.
    pub fn new(domains: Vec<String>) -> Self {
        let total = domains.len();
        Self {
            chunk_size: initial_chunk_size(total),
            chunk_index: 0,
            progress: ProgressTracker::new(total),
            domains,
        }
    }

    /// A handle on this job's progress counters.
    pub fn progress(&self) -> ProgressTracker {
        self.progress.clone()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// One finished chunk, handed to the `on_chunk_complete` callback.
#[derive(Debug, Clone)]
pub struct ChunkReport {
    /// Zero-based chunk number
    pub index: usize,
    /// Outcomes in input order
    pub outcomes: Vec<ResolutionOutcome>,
    /// Successful outcomes in this chunk
    pub succeeded: usize,
    /// Size chosen for the next chunk
    pub next_chunk_size: usize,
}

impl ChunkReport {
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.succeeded as f64 / self.outcomes.len() as f64
        }
    }
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Outcomes of completed chunks, in input order
    pub outcomes: Vec<ResolutionOutcome>,
    /// Chunks that ran
    pub chunks: usize,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs batch jobs against a shared resolver.
#[derive(Clone)]
pub struct BatchScheduler {
    resolver: Arc<Resolver>,
    chunk_delay: Duration,
}

impl BatchScheduler {
    /// Create a scheduler using the resolver's configured chunk delay.
    pub fn new(resolver: Arc<Resolver>) -> Self {
        let chunk_delay = resolver.config().chunk_delay;
        Self {
            resolver,
            chunk_delay,
        }
    }

    /// Override the pause between chunks.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Run a job to completion or cancellation.
    ///
    /// # Arguments
    ///
    /// * `job` - The job to run; its tracker is reset and advanced per domain
    /// * `cancel` - Checked before each chunk and during the pause
    /// * `on_chunk_complete` - Called once per finished chunk
    ///
    /// # Returns
    ///
    /// A `BatchReport` with the outcomes of every chunk that ran.
    pub async fn run<F>(
        &self,
        mut job: BatchJob,
        cancel: &CancellationToken,
        mut on_chunk_complete: F,
    ) -> BatchReport
    where
        F: FnMut(&ChunkReport),
    {
        let total = job.domains.len();
        let progress = job.progress.clone();
        progress.reset(total);

        let mut report = BatchReport {
            outcomes: Vec::with_capacity(total),
            ..BatchReport::default()
        };
        let mut offset = 0;

        while offset < total {
            if cancel.is_cancelled() {
                info!(completed = offset, total, "batch cancelled");
                report.cancelled = true;
                break;
            }

            let end = (offset + job.chunk_size.max(1)).min(total);
            info!(
                chunk = job.chunk_index + 1,
                size = end - offset,
                offset,
                total,
                "starting chunk"
            );

            let tasks = job.domains[offset..end].iter().map(|domain| {
                let progress = &progress;
                async move {
                    let outcome = self.resolver.resolve(domain).await;
                    progress.advance();
                    outcome
                }
            });
            let outcomes = join_all(tasks).await;

            let succeeded = outcomes.iter().filter(|o| o.success).count();
            let rate = succeeded as f64 / outcomes.len() as f64;
            job.chunk_size = next_chunk_size(job.chunk_size, rate);

            let chunk = ChunkReport {
                index: job.chunk_index,
                outcomes,
                succeeded,
                next_chunk_size: job.chunk_size,
            };
            info!(
                chunk = chunk.index + 1,
                succeeded,
                failed = chunk.outcomes.len() - succeeded,
                next_size = job.chunk_size,
                "chunk complete"
            );
            on_chunk_complete(&chunk);
            report.outcomes.extend(chunk.outcomes);
            report.chunks += 1;

            job.chunk_index += 1;
            offset = end;

            if offset < total {
                tokio::select! {
                    _ = tokio::time::sleep(self.chunk_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::protocols::{WhoisClient, WhoisTransport};
    use crate::types::ResolveConfig;
    use async_trait::async_trait;

    struct RegisteredTransport;

    #[async_trait]
    impl WhoisTransport for RegisteredTransport {
        async fn fetch(&self, _server: &str, query: &str) -> Result<String, ResolveError> {
            Ok(format!("Domain Name: {}\nRegistrar: Example Corp\n", query))
        }
    }

    fn scheduler() -> BatchScheduler {
        let resolver = Resolver::from_parts(
            ResolveConfig::default(),
            WhoisClient::with_transport(Arc::new(RegisteredTransport)),
            Vec::new(),
        );
        BatchScheduler::new(Arc::new(resolver))
    }

    fn domains(n: usize, suffix: &str) -> Vec<String> {
        (0..n).map(|i| format!("d{}.{}", i, suffix)).collect()
    }

    #[test]
    fn test_initial_chunk_size() {
        assert_eq!(initial_chunk_size(0), 0);
        assert_eq!(initial_chunk_size(4), 4);
        assert_eq!(initial_chunk_size(5), 5);
        assert_eq!(initial_chunk_size(6), 5);
        assert_eq!(initial_chunk_size(10), 5);
        assert_eq!(initial_chunk_size(12), 10);
    }

    #[test]
    fn test_next_chunk_size() {
        assert_eq!(next_chunk_size(10, 0.95), 12);
        assert_eq!(next_chunk_size(10, 0.5), 8);
        assert_eq!(next_chunk_size(10, 0.8), 10);
        assert_eq!(next_chunk_size(10, 0.9), 10);
        assert_eq!(next_chunk_size(10, 0.7), 10);
        assert_eq!(next_chunk_size(19, 1.0), 20);
        assert_eq!(next_chunk_size(20, 1.0), 20);
        assert_eq!(next_chunk_size(4, 0.0), 3);
        assert_eq!(next_chunk_size(3, 0.0), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_preserves_order_and_progress() {
        let job = BatchJob::new(domains(12, "com"));
        let progress = job.progress();
        let mut sizes = Vec::new();

        let started = tokio::time::Instant::now();
        let report = scheduler()
            .run(job, &CancellationToken::new(), |chunk| {
                sizes.push(chunk.outcomes.len())
            })
            .await;

        assert_eq!(sizes, vec![10, 2]);
        assert!(!report.cancelled);
        assert_eq!(report.chunks, 2);
        let order: Vec<&str> = report.outcomes.iter().map(|o| o.domain.as_str()).collect();
        assert_eq!(order, domains(12, "com"));
        assert_eq!(progress.snapshot().percentage, 100);
        // One pause between the two chunks.
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Answers `d0.*` last so completion order differs from input order.
    struct SlowFirstTransport {
        finished: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WhoisTransport for SlowFirstTransport {
        async fn fetch(&self, _server: &str, query: &str) -> Result<String, ResolveError> {
            let delay = if query.starts_with("d0.") { 500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.finished.lock().unwrap().push(query.to_string());
            Ok(format!("Domain Name: {}\nRegistrar: Example Corp\n", query))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_keeps_input_order_when_completion_differs() {
        let transport = Arc::new(SlowFirstTransport {
            finished: std::sync::Mutex::new(Vec::new()),
        });
        let resolver = Resolver::from_parts(
            ResolveConfig::default(),
            WhoisClient::with_transport(transport.clone()),
            Vec::new(),
        );

        let report = BatchScheduler::new(Arc::new(resolver))
            .run(BatchJob::new(domains(4, "com")), &CancellationToken::new(), |_| {})
            .await;

        let finished = transport.finished.lock().unwrap().clone();
        assert_eq!(finished.last().map(String::as_str), Some("d0.com"));

        let order: Vec<&str> = report.outcomes.iter().map(|o| o.domain.as_str()).collect();
        assert_eq!(order, domains(4, "com"));
        assert!(report.outcomes.iter().all(|o| o.success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_shrink_chunks() {
        // All unsupported: every chunk has success rate 0.
        let job = BatchJob::new(domains(25, "zzzz"));
        let mut sizes = Vec::new();

        let report = scheduler()
            .run(job, &CancellationToken::new(), |chunk| {
                sizes.push(chunk.outcomes.len())
            })
            .await;

        assert_eq!(sizes, vec![10, 8, 6, 1]);
        assert_eq!(report.failed(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_first_chunk() {
        // 25 domains: chunks of 10, 12, 3.
        let job = BatchJob::new(domains(25, "com"));
        let progress = job.progress();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let report = scheduler()
            .run(job, &cancel, |chunk| {
                if chunk.index == 0 {
                    trigger.cancel();
                }
            })
            .await;

        assert!(report.cancelled);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(progress.snapshot().processed, 10);
        assert_eq!(progress.snapshot().percentage, 40);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = scheduler()
            .run(BatchJob::new(domains(3, "com")), &cancel, |_| {})
            .await;

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_empty_job() {
        let report = scheduler()
            .run(BatchJob::new(Vec::new()), &CancellationToken::new(), |_| {})
            .await;
        assert_eq!(report.chunks, 0);
        assert!(!report.cancelled);
    }
}
