//! Named posting tasks and the actions that trigger them

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::client::PostingClient;
use crate::content::{Content, ContentSource};
use crate::error::{Result, SatcastError};
use crate::types::PostResult;

/// One of the bot's fixed posting jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Task {
    Bitcoin1hPriceUpdate,
    Bitcoin24hPriceUpdate,
    FearGreedIndex,
    BitcoinMonthlyReturns,
    DonationReminder,
}

impl Task {
    /// Every task, in batch order
    pub const ALL: [Task; 5] = [
        Task::Bitcoin1hPriceUpdate,
        Task::Bitcoin24hPriceUpdate,
        Task::FearGreedIndex,
        Task::BitcoinMonthlyReturns,
        Task::DonationReminder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Task::Bitcoin1hPriceUpdate => "bitcoin1hPriceUpdate",
            Task::Bitcoin24hPriceUpdate => "bitcoin24hPriceUpdate",
            Task::FearGreedIndex => "fearGreedIndex",
            Task::BitcoinMonthlyReturns => "bitcoinMonthlyReturns",
            Task::DonationReminder => "donationReminder",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an HTTP trigger or the CLI can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Task(Task),
    /// Run every task through the batch runner
    AllTasks,
}

const ACTION_NAMES: &[(&str, Action)] = &[
    ("tweetFearGreedIndexTweet", Action::Task(Task::FearGreedIndex)),
    ("postBlueSkyFearGreedIndexTweet", Action::Task(Task::FearGreedIndex)),
    ("postFearGreedIndexToAll", Action::Task(Task::FearGreedIndex)),
    ("tweetBitcoinMonthlyReturns", Action::Task(Task::BitcoinMonthlyReturns)),
    ("postBlueSkyBitcoinMonthlyReturns", Action::Task(Task::BitcoinMonthlyReturns)),
    ("postBitcoinMonthlyReturnsToAll", Action::Task(Task::BitcoinMonthlyReturns)),
    ("tweetBitcoin1hPriceUpdate", Action::Task(Task::Bitcoin1hPriceUpdate)),
    ("postBlueSkyBitcoin1hPriceUpdate", Action::Task(Task::Bitcoin1hPriceUpdate)),
    ("postBitcoin1hPriceUpdateToAll", Action::Task(Task::Bitcoin1hPriceUpdate)),
    ("tweetBitcoin24hPriceUpdate", Action::Task(Task::Bitcoin24hPriceUpdate)),
    ("postBlueSkyBitcoin24hPriceUpdate", Action::Task(Task::Bitcoin24hPriceUpdate)),
    ("postBitcoin24hPriceUpdateToAll", Action::Task(Task::Bitcoin24hPriceUpdate)),
    ("postDonationReminderToAll", Action::Task(Task::DonationReminder)),
    ("allUnifiedTasks", Action::AllTasks),
];

impl Action {
    /// Every accepted action name
    pub fn names() -> Vec<&'static str> {
        ACTION_NAMES.iter().map(|(name, _)| *name).collect()
    }
}

impl FromStr for Action {
    type Err = SatcastError;

    fn from_str(s: &str) -> Result<Self> {
        ACTION_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, action)| *action)
            .or_else(|| Task::ALL.into_iter().find(|t| t.name() == s).map(Action::Task))
            .ok_or_else(|| SatcastError::InvalidInput(format!("Unknown action: {}", s)))
    }
}

/// Outcome of one task execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_name: String,
    /// Content was gathered and every platform attempted (each may still have failed)
    pub success: bool,
    pub per_platform: BTreeMap<String, PostResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn completed(task: Task, results: Vec<PostResult>) -> Self {
        Self {
            task_name: task.name().to_string(),
            success: true,
            per_platform: results
                .into_iter()
                .map(|r| (r.platform.clone(), r))
                .collect(),
            error: None,
        }
    }

    /// Content gathering failed; no platform was attempted
    pub fn failed(task: Task, error: &SatcastError) -> Self {
        Self {
            task_name: task.name().to_string(),
            success: false,
            per_platform: BTreeMap::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn platform(&self, name: &str) -> Option<&PostResult> {
        self.per_platform.get(name)
    }
}

/// Runs a task against every configured platform
pub struct TaskOrchestrator {
    content: Arc<dyn ContentSource>,
    clients: Vec<PostingClient>,
}

impl TaskOrchestrator {
    pub fn new(content: Arc<dyn ContentSource>, clients: Vec<PostingClient>) -> Self {
        Self { content, clients }
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.name()).collect()
    }

    pub fn clients(&self) -> &[PostingClient] {
        &self.clients
    }

    /// Gather content for `task` and post it to all platforms concurrently
    ///
    /// Platform failures are reported inside the result and never abort the
    /// other platforms.
    ///
    /// # Errors
    ///
    /// Returns the content-gathering error; no platform is attempted then.
    pub async fn execute(&self, task: Task) -> Result<TaskResult> {
        info!(task = task.name(), platforms = self.clients.len(), "Executing task");

        let content = self.content.gather(task).await.map_err(|e| {
            error!(task = task.name(), error = %e, "Failed to gather content");
            e
        })?;

        let results = match content {
            Content::Skip(reason) => {
                info!(task = task.name(), reason = %reason, "Task skipped");
                self.clients
                    .iter()
                    .map(|c| PostResult::skipped(c.name(), reason.clone()))
                    .collect()
            }
            Content::Post(request) => {
                join_all(self.clients.iter().map(|client| client.post(&request))).await
            }
        };

        let result = TaskResult::completed(task, results);
        for (platform, outcome) in &result.per_platform {
            info!(
                task = task.name(),
                platform = %platform,
                status = if outcome.success { "SUCCESS" } else { "FAILED" },
                "Task platform outcome"
            );
        }
        Ok(result)
    }
}
