use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend task state as reported by the deployment backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted by the backend, not yet started
    Queued,
    /// Currently running
    Processing,
    /// Finished successfully
    Done,
    /// Finished with an error
    Error,
    /// Cancelled before completion
    Cancelled,
    /// Cancellation requested but not finished
    Cancelling,
    /// Exceeded the backend's time limit
    Timeout,
    /// A state string this broker does not know
    #[serde(other)]
    Unrecognized,
}

/// Coarse outcome of a backend task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    Incomplete,
    Succeeded,
    Failed,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Processing | Self::Cancelling)
    }

    /// Only `done` counts as complete for errand sequencing
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn outcome(&self) -> TaskOutcome {
        match self {
            Self::Queued | Self::Processing | Self::Cancelling => TaskOutcome::Incomplete,
            Self::Done => TaskOutcome::Succeeded,
            Self::Error | Self::Cancelled | Self::Timeout | Self::Unrecognized => {
                TaskOutcome::Failed
            }
        }
    }

    /// Terminal states never move again; non-terminal ones move forward only
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        match self {
            Self::Queued => true,
            Self::Processing => next != Self::Queued,
            Self::Cancelling => matches!(next, Self::Cancelling | Self::Cancelled | Self::Done | Self::Error),
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            "cancelling" => Ok(Self::Cancelling),
            "timeout" => Ok(Self::Timeout),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// A task owned by the deployment backend. The broker only reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTask {
    pub id: u64,
    pub state: TaskState,
    pub description: String,
    pub result: String,
    #[serde(default)]
    pub context_id: String,
}

impl BackendTask {
    pub fn new(id: u64, state: TaskState) -> Self {
        Self {
            id,
            state,
            description: String::new(),
            result: String::new(),
            context_id: String::new(),
        }
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = context_id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
}
