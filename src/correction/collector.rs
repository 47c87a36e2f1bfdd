//! Background Reconciliation Worker
//!
//! One dedicated thread per session inspects debt buffers in submission
//! order and asks for a strict re-evaluation when a buffered token looks
//! promising. Panics inside a job are caught and reported as a metric.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::align::observer::{emit_metric, AlignmentObserver};
use crate::config::DebtTuning;
use crate::core::types::RecognizedToken;
use crate::error::{ReadAlongError, ReadAlongResult};
use crate::utils::fuzzy::SimilarityScorer;

/// Snapshot of one debt buffer to inspect
#[derive(Debug, Clone, PartialEq)]
pub struct InspectJob {
    pub debt_index: usize,
    /// Normalized reference word in debt
    pub target: String,
    pub snapshot: Vec<RecognizedToken>,
    pub epoch: u64,
}

/// Commands sent to the worker thread
enum WorkerCommand {
    Inspect(InspectJob),
    Shutdown,
}

/// Most recent buffered token whose cheap score and confidence clear the
/// tuning floors.
pub fn pick_candidate(
    job: &InspectJob,
    scorer: &SimilarityScorer,
    tuning: &DebtTuning,
) -> Option<RecognizedToken> {
    job.snapshot
        .iter()
        .rev()
        .find(|token| {
            token.confidence >= tuning.quick_min_confidence
                && scorer.score(&token.text, &job.target) >= tuning.quick_threshold
        })
        .cloned()
}

/// Handle to the reconciliation thread
pub struct ReconciliationWorker {
    sender: Mutex<Option<mpsc::Sender<WorkerCommand>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    stopping: Arc<AtomicBool>,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for ReconciliationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationWorker").finish()
    }
}

impl ReconciliationWorker {
    /// Spawn the worker thread. `handler` runs once per submitted job.
    pub fn spawn<H>(
        handler: H,
        observer: Arc<dyn AlignmentObserver>,
        shutdown_grace: Duration,
    ) -> ReadAlongResult<Self>
    where
        H: Fn(InspectJob) + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<WorkerCommand>();
        let stopping = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopping);

        let handle = thread::Builder::new()
            .name("debt-collector".to_string())
            .spawn(move || Self::worker_thread(receiver, handler, observer, flag))
            .map_err(|e| ReadAlongError::Worker(format!("debt collector thread: {}", e)))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            stopping,
            shutdown_grace,
        })
    }

    fn worker_thread<H>(
        receiver: mpsc::Receiver<WorkerCommand>,
        handler: H,
        observer: Arc<dyn AlignmentObserver>,
        stopping: Arc<AtomicBool>,
    ) where
        H: Fn(InspectJob),
    {
        debug!("debt collector started");
        while let Ok(command) = receiver.recv() {
            match command {
                WorkerCommand::Shutdown => break,
                WorkerCommand::Inspect(job) => {
                    if stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    let debt_index = job.debt_index;
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(job))) {
                        let message = panic_message(panic.as_ref());
                        warn!(debt = debt_index, "⚠️ debt collector job failed: {}", message);
                        emit_metric(observer.as_ref(), "collector_exception", &message);
                    }
                }
            }
        }
        debug!("debt collector stopped");
    }

    /// Queue a job; false once the worker is stopping.
    pub fn submit(&self, job: InspectJob) -> bool {
        if self.stopping.load(Ordering::SeqCst) {
            return false;
        }
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => tx.send(WorkerCommand::Inspect(job)).is_ok(),
            None => false,
        }
    }

    /// Stop the thread, waiting at most the grace period before detaching it.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(tx) = self.sender.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(WorkerCommand::Shutdown);
        }

        let Some(handle) = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return;
        };

        let deadline = Instant::now() + self.shutdown_grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if handle.is_finished() {
            let _ = handle.join();
            info!("🛑 Debt collector shut down");
        } else {
            warn!(
                "⚠️ Debt collector still busy after {}ms, detaching",
                self.shutdown_grace.as_millis()
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ReconciliationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::observer::NullObserver;
    use crate::core::types::WordColor;

    #[derive(Default)]
    struct MetricLog {
        metrics: Mutex<Vec<(String, String)>>,
    }

    impl AlignmentObserver for MetricLog {
        fn mark_word(&self, _index: usize, _color: WordColor) {}
        fn advance_cursor_to(&self, _index: usize) {}
        fn log_metric(&self, key: &str, value: &str) {
            self.metrics
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
        }
    }

    fn job(debt_index: usize, tokens: &[(&str, f32)]) -> InspectJob {
        InspectJob {
            debt_index,
            target: "elephant".to_string(),
            snapshot: tokens
                .iter()
                .map(|(t, c)| RecognizedToken::with_confidence(*t, *c))
                .collect(),
            epoch: 0,
        }
    }

    #[test]
    fn test_pick_candidate_most_recent_first() {
        let scorer = SimilarityScorer::default();
        let tuning = DebtTuning::default();
        let picked = pick_candidate(
            &job(0, &[("elephant", 1.0), ("giraffe", 1.0), ("elefant", 0.9)]),
            &scorer,
            &tuning,
        );
        assert_eq!(picked.map(|t| t.text), Some("elefant".to_string()));
    }

    #[test]
    fn test_pick_candidate_respects_floors() {
        let scorer = SimilarityScorer::default();
        let tuning = DebtTuning::default();
        assert!(pick_candidate(&job(0, &[("giraffe", 1.0)]), &scorer, &tuning).is_none());
        assert!(pick_candidate(&job(0, &[("elephant", 0.1)]), &scorer, &tuning).is_none());
    }

    #[test]
    fn test_jobs_run_in_order() {
        let (tx, rx) = mpsc::channel();
        let worker = ReconciliationWorker::spawn(
            move |job: InspectJob| {
                let _ = tx.send(job.debt_index);
            },
            Arc::new(NullObserver),
            Duration::from_millis(200),
        )
        .expect("spawn");

        for i in 0..5 {
            assert!(worker.submit(job(i, &[])));
        }
        let seen: Vec<usize> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).expect("job"))
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panic_is_reported_and_worker_survives() {
        let log = Arc::new(MetricLog::default());
        let (tx, rx) = mpsc::channel();
        let worker = ReconciliationWorker::spawn(
            move |job: InspectJob| {
                if job.debt_index == 0 {
                    panic!("bad buffer");
                }
                let _ = tx.send(job.debt_index);
            },
            log.clone(),
            Duration::from_millis(200),
        )
        .expect("spawn");

        worker.submit(job(0, &[]));
        worker.submit(job(1, &[]));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).expect("job"), 1);

        let metrics = log.metrics.lock().unwrap().clone();
        assert_eq!(
            metrics,
            vec![("collector_exception".to_string(), "bad buffer".to_string())]
        );
        assert!(worker.is_running());
    }

    #[test]
    fn test_shutdown_is_bounded() {
        let worker = ReconciliationWorker::spawn(
            |_job: InspectJob| thread::sleep(Duration::from_millis(500)),
            Arc::new(NullObserver),
            Duration::from_millis(50),
        )
        .expect("spawn");
        worker.submit(job(0, &[]));
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        worker.shutdown();
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(!worker.submit(job(1, &[])));
    }
}
