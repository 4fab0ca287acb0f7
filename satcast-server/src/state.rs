//! Shared application state

use std::sync::Arc;
use std::time::Instant;

use libsatcast::{BatchRunner, TaskOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TaskOrchestrator>,
    pub batch: Arc<BatchRunner>,
    pub started: Instant,
}

impl AppState {
    /// Batch runner over every task of `orchestrator`
    pub fn new(orchestrator: Arc<TaskOrchestrator>) -> Self {
        Self {
            batch: Arc::new(BatchRunner::new(orchestrator.clone())),
            orchestrator,
            started: Instant::now(),
        }
    }
}
