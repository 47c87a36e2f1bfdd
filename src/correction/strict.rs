//! Strict Correction Service
//!
//! Runs the expensive comparison for a debt on a small blocking pool with a
//! hard wall-clock timeout. Every accepted request gets exactly one callback,
//! delivered from a runtime thread, never from the submitting thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::StrictTuning;
use crate::core::types::Verdict;
use crate::error::{ReadAlongError, ReadAlongResult};
use crate::utils::fuzzy::SimilarityScorer;

/// Expensive comparison returning a score in `[0, 1]`
pub trait StrictComparator: Send + Sync {
    fn compare(&self, candidate: &str, target: &str) -> f32;
}

impl<F> StrictComparator for F
where
    F: Fn(&str, &str) -> f32 + Send + Sync,
{
    fn compare(&self, candidate: &str, target: &str) -> f32 {
        self(candidate, target)
    }
}

/// Default comparator: the similarity scorer
#[derive(Debug, Clone, Default)]
pub struct ScoreComparator {
    scorer: SimilarityScorer,
}

impl ScoreComparator {
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self { scorer }
    }
}

impl StrictComparator for ScoreComparator {
    fn compare(&self, candidate: &str, target: &str) -> f32 {
        self.scorer.score(candidate, target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrictRequest {
    pub debt_index: usize,
    pub candidate: String,
    pub target: String,
    pub threshold: f32,
    /// Session epoch the request was issued in
    pub epoch: u64,
}

/// How a request ended
#[derive(Debug, Clone, PartialEq)]
pub enum StrictOutcome {
    Scored(f32),
    TimedOut,
    /// Comparator panicked or the pool was closed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrictResult {
    pub debt_index: usize,
    pub verdict: Verdict,
    pub outcome: StrictOutcome,
    pub elapsed_ms: u64,
    pub epoch: u64,
}

impl StrictResult {
    fn unknown(request: &StrictRequest, outcome: StrictOutcome, started: Instant) -> Self {
        Self {
            debt_index: request.debt_index,
            verdict: Verdict::Unknown,
            outcome,
            elapsed_ms: started.elapsed().as_millis() as u64,
            epoch: request.epoch,
        }
    }
}

/// Bounded pool plus timeout supervision for strict comparisons
pub struct StrictCorrectionService {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    semaphore: Arc<Semaphore>,
    closed: AtomicBool,
    timeout: Duration,
    shutdown_grace: Duration,
}

impl StrictCorrectionService {
    pub fn new(tuning: &StrictTuning) -> ReadAlongResult<Self> {
        let concurrency = tuning.max_concurrency.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(concurrency)
            .thread_name("strict-correction")
            .enable_time()
            .build()
            .map_err(|e| ReadAlongError::Worker(format!("strict correction runtime: {}", e)))?;

        info!(
            "✅ Strict correction service ready (concurrency {}, timeout {}ms)",
            concurrency, tuning.timeout_ms
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            closed: AtomicBool::new(false),
            timeout: Duration::from_millis(tuning.timeout_ms),
            shutdown_grace: Duration::from_millis(tuning.shutdown_grace_ms),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue a strict check. `callback` runs exactly once for an accepted
    /// request. After shutdown the request is dropped and `callback` never runs.
    pub fn submit<F>(&self, request: StrictRequest, comparator: Arc<dyn StrictComparator>, callback: F)
    where
        F: FnOnce(StrictResult) + Send + 'static,
    {
        if self.is_closed() {
            debug!(debt = request.debt_index, "strict correction after shutdown dropped");
            return;
        }

        let semaphore = Arc::clone(&self.semaphore);
        let timeout = self.timeout;

        self.handle.spawn(async move {
            let started = Instant::now();
            let result = supervise(request, comparator, semaphore, timeout, started).await;
            debug!(
                debt = result.debt_index,
                verdict = ?result.verdict,
                elapsed_ms = result.elapsed_ms,
                "strict check finished"
            );
            if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                warn!("⚠️ strict correction callback panicked");
            }
        });
    }

    /// Stop accepting work and release the pool with a bounded wait.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(runtime) = runtime {
            // Blocking shutdown is not allowed from inside another runtime
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(self.shutdown_grace);
            }
            debug!("strict correction service stopped");
        }
    }
}

impl Drop for StrictCorrectionService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn supervise(
    request: StrictRequest,
    comparator: Arc<dyn StrictComparator>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    started: Instant,
) -> StrictResult {
    let deadline = tokio::time::Instant::from_std(started) + timeout;

    let permit = match tokio::time::timeout_at(deadline, semaphore.acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => {
            return StrictResult::unknown(&request, StrictOutcome::Failed("pool closed".to_string()), started)
        }
        Err(_) => return StrictResult::unknown(&request, StrictOutcome::TimedOut, started),
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let candidate = request.candidate.clone();
    let target = request.target.clone();

    let mut worker = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        if flag.load(Ordering::SeqCst) {
            return None;
        }
        Some(comparator.compare(&candidate, &target))
    });

    match tokio::time::timeout_at(deadline, &mut worker).await {
        Ok(Ok(Some(score))) => StrictResult {
            debt_index: request.debt_index,
            verdict: Verdict::from_score(score, request.threshold),
            outcome: StrictOutcome::Scored(score),
            elapsed_ms: started.elapsed().as_millis() as u64,
            epoch: request.epoch,
        },
        Ok(Ok(None)) => StrictResult::unknown(&request, StrictOutcome::TimedOut, started),
        Ok(Err(e)) => StrictResult::unknown(&request, StrictOutcome::Failed(e.to_string()), started),
        Err(_) => {
            cancelled.store(true, Ordering::SeqCst);
            worker.abort();
            StrictResult::unknown(&request, StrictOutcome::TimedOut, started)
        }
    }
}
