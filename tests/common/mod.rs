#![allow(dead_code)]

pub mod mock_observer;
pub mod mock_recognizer;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use readalong::core::ManualClock;
use readalong::utils::DistanceEngine;
use readalong::{Config, Difficulty, SessionController};

pub use mock_observer::{MockObserver, ObserverCall};
pub use mock_recognizer::MockRecognizer;

/// Session on a manual clock with a recording observer
pub struct TestSession {
    pub session: SessionController,
    pub observer: Arc<MockObserver>,
    pub clock: ManualClock,
}

impl TestSession {
    pub fn new(text: &str, difficulty: Difficulty) -> Self {
        let config = Config {
            difficulty,
            ..Config::default()
        };
        Self::with_config(text, &config)
    }

    pub fn with_config(text: &str, config: &Config) -> Self {
        let observer = Arc::new(MockObserver::default());
        let clock = ManualClock::new();
        let session = SessionController::with_parts(
            text,
            config,
            observer.clone(),
            Arc::new(clock.clone()),
            Arc::new(DistanceEngine::default()),
        )
        .expect("Failed to create session");
        Self {
            session,
            observer,
            clock,
        }
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
