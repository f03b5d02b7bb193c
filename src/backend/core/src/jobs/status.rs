//! Run status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collector::PostList;

/// Lifecycle state of the collection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the job, as served by `GET /status`.
///
/// Invariants kept by the transition methods:
/// - `Running` never carries an error message
/// - `Completed` always carries a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub status: RunState,
    pub timestamp: DateTime<Utc>,
    pub last_result: Option<PostList>,
    pub error_message: Option<String>,
}

impl RunStatus {
    pub fn idle() -> Self {
        Self {
            status: RunState::Idle,
            timestamp: Utc::now(),
            last_result: None,
            error_message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunState::Running
    }

    pub(crate) fn start(&mut self) {
        self.status = RunState::Running;
        self.timestamp = Utc::now();
        self.last_result = None;
        self.error_message = None;
    }

    pub(crate) fn complete(&mut self, result: PostList) {
        self.status = RunState::Completed;
        self.timestamp = Utc::now();
        self.last_result = Some(result);
        self.error_message = None;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = RunState::Error;
        self.timestamp = Utc::now();
        self.last_result = None;
        self.error_message = Some(message);
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_keep_invariants() {
        let mut status = RunStatus::idle();
        status.fail("timeout".to_string());
        assert_eq!(status.status, RunState::Error);

        status.start();
        assert!(status.is_running());
        assert!(status.error_message.is_none());
        assert!(status.last_result.is_none());

        status.complete(PostList::default());
        assert_eq!(status.status, RunState::Completed);
        assert!(status.last_result.is_some());
        assert!(status.error_message.is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(RunStatus::idle()).unwrap();
        assert_eq!(value["status"], "idle");
        assert!(value["last_result"].is_null());
        assert!(value["error_message"].is_null());
        assert!(value["timestamp"].is_string());
    }
}
