//! Execution session
//!
//! A run owns its worker pool for exactly as long as the run lasts. Stages that
//! fan out per row (timestamp parsing, for one) do so on this pool when called
//! from inside [`ForecastSession::install`].

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{ForecastError, Result};

pub struct ForecastSession {
    pool: ThreadPool,
    opened_at: Instant,
}

impl ForecastSession {
    /// Acquire a worker pool sized by `config.worker_threads` (0 = one per core).
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("forecast-worker-{i}"))
            .build()
            .map_err(|e| ForecastError::Config(format!("failed to start worker pool: {e}")))?;

        info!(threads = pool.current_num_threads(), "forecast session opened");
        Ok(Self {
            pool,
            opened_at: Instant::now(),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on this session's pool, blocking until it finishes.
    pub fn install<T, F>(&self, job: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        debug!("dispatching job to session pool");
        self.pool.install(job)
    }
}

impl Drop for ForecastSession {
    fn drop(&mut self) {
        info!(
            elapsed_ms = self.opened_at.elapsed().as_millis() as u64,
            "forecast session closed"
        );
    }
}
