//! Sequential run of every task

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::tasks::{Task, TaskOrchestrator, TaskResult};

/// One failure in a batch, keyed `<task>_<platform>` or just `<task>`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchError {
    pub task: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub per_task: BTreeMap<String, TaskResult>,
    pub errors: Vec<BatchError>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success_count: usize,
    pub total_tasks: usize,
    pub error_count: usize,
}

impl BatchResult {
    fn record(&mut self, result: TaskResult) {
        if result.success {
            for (platform, outcome) in &result.per_platform {
                if let (false, Some(error)) = (outcome.success, &outcome.error) {
                    self.errors.push(BatchError {
                        task: format!("{}_{}", result.task_name, platform),
                        error: error.clone(),
                    });
                }
            }
        } else {
            self.errors.push(BatchError {
                task: result.task_name.clone(),
                error: result.error.clone().unwrap_or_default(),
            });
        }
        self.per_task.insert(result.task_name.clone(), result);
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            success_count: self.per_task.values().filter(|r| r.success).count(),
            total_tasks: self.per_task.len(),
            error_count: self.errors.len(),
        }
    }
}

pub struct BatchRunner {
    orchestrator: Arc<TaskOrchestrator>,
    tasks: Vec<Task>,
}

impl BatchRunner {
    /// Runner over [`Task::ALL`]
    pub fn new(orchestrator: Arc<TaskOrchestrator>) -> Self {
        Self::with_tasks(orchestrator, Task::ALL.to_vec())
    }

    pub fn with_tasks(orchestrator: Arc<TaskOrchestrator>, tasks: Vec<Task>) -> Self {
        Self {
            orchestrator,
            tasks,
        }
    }

    /// Run every task in order; a failing task never stops the batch
    pub async fn run(&self) -> BatchResult {
        let mut batch = BatchResult::default();

        for &task in &self.tasks {
            info!(task = task.name(), "Executing batch task");
            let result = match self.orchestrator.execute(task).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(task = task.name(), error = %e, "Batch task failed");
                    TaskResult::failed(task, &e)
                }
            };
            batch.record(result);
        }

        let summary = batch.summary();
        info!(
            success_count = summary.success_count,
            total_tasks = summary.total_tasks,
            error_count = summary.error_count,
            "Batch completed"
        );
        batch
    }
}
