use serde::{Deserialize, Serialize};

use ethers_core::types::H256;

/// Response to the task status api call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged, rename_all = "camelCase")]
pub enum TaskStatusResponse {
    /// Status
    Task {
        /// Status data
        task: TransactionStatus,
    },
    /// Response with messages
    Error {
        /// error message
        message: String,
    },
}

impl TaskStatusResponse {
    /// The status, if the backend returned one
    pub fn into_status(self) -> Option<TransactionStatus> {
        match self {
            Self::Task { task } => Some(task),
            Self::Error { message } => {
                tracing::debug!(message = message.as_str(), "No task status");
                None
            }
        }
    }
}

/// A TransactionStatus object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    /// Chain id
    #[serde(with = "crate::ser::decimal_u64_ser")]
    pub chain_id: u64,
    /// Task id
    pub task_id: H256,
    /// Task state
    pub task_state: TaskState,
    /// Created at date/time string
    pub creation_date: String,
    /// Last check date/time string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_date: Option<String>,
    /// Message from the last check. Often a revert reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_message: Option<String>,
    /// Transaction hash, once submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<H256>,
    /// Block number, once mined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Execution date/time string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_date: Option<String>,
}

impl TransactionStatus {
    /// Execution details, if the task made it on-chain
    pub fn execution(&self) -> Option<Execution> {
        Some(Execution {
            transaction_hash: self.transaction_hash?,
            block_number: self.block_number,
            execution_date: self.execution_date.clone(),
        })
    }
}

/// Execution details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Block number
    pub block_number: Option<u64>,
    /// Execution date/time string
    pub execution_date: Option<String>,
}

/// Task states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    /// CheckPending
    CheckPending,
    /// ExecPending
    ExecPending,
    /// WaitingForConfirmation
    WaitingForConfirmation,
    /// ExecSuccess
    ExecSuccess,
    /// ExecReverted
    ExecReverted,
    /// Cancelled
    Cancelled,
    /// NotFound
    NotFound,
    /// A state this client does not know
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Whether the task will not change state anymore
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExecSuccess | Self::ExecReverted | Self::Cancelled | Self::NotFound
        )
    }
}
