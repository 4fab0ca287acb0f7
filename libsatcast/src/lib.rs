//! Satcast - scheduled Bitcoin market updates for social platforms
//!
//! This library gathers price, sentiment and chart data, renders the post
//! text, and publishes it to every configured platform through a posting
//! client that owns its own rate limiter, circuit breaker and retry policy.

pub mod app;
pub mod batch;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod content;
pub mod error;
pub mod images;
pub mod logging;
pub mod market;
pub mod messages;
pub mod platforms;
pub mod prices;
pub mod rate_limiter;
pub mod retry;
pub mod schedule;
pub mod tasks;
pub mod types;

// Re-export commonly used types
pub use batch::{BatchError, BatchResult, BatchRunner, BatchSummary};
pub use client::{PostingClient, PostingSettings};
pub use config::Config;
pub use error::{ApiError, ConfigError, PlatformError, Result, SatcastError};
pub use tasks::{Action, Task, TaskOrchestrator, TaskResult};
pub use types::{PostRequest, PostResult};
