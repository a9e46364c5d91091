//! Climate Data Store retrieval.

pub mod client;
pub mod config;
pub mod error;
pub mod reply;

pub use client::CdsClient;
pub use config::CdsConfig;
pub use error::CdsError;
pub use reply::{PollSchedule, TaskReply, TaskState};
