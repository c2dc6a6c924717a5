//! # Operation Token Codec
//!
//! Encodes [`OperationData`] into the opaque string handed back to the OSB
//! client and decodes it again on last-operation polls. The JSON wire form
//! accepts both the current `Errands` list and the legacy single
//! `PreDeleteErrand` object.

use crate::models::{OperationData, OperationType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationDataError {
    #[error("operation data is missing")]
    MissingOperationData,

    #[error("operation data is malformed: {0}")]
    MalformedToken(String),

    #[error("operation data for a {operation_type} operation has no backend task id")]
    MissingTaskID { operation_type: OperationType },

    #[error("failed to encode operation data: {0}")]
    Encode(String),
}

impl OperationDataError {
    /// Operation type, when the token got far enough to reveal it
    pub fn operation_type(&self) -> Option<OperationType> {
        match self {
            OperationDataError::MissingTaskID { operation_type } => Some(*operation_type),
            _ => None,
        }
    }
}

pub fn encode(data: &OperationData) -> Result<String, OperationDataError> {
    serde_json::to_string(data).map_err(|e| OperationDataError::Encode(e.to_string()))
}

pub fn decode(token: &str) -> Result<OperationData, OperationDataError> {
    if token.trim().is_empty() {
        return Err(OperationDataError::MissingOperationData);
    }

    let data: OperationData = serde_json::from_str(token)
        .map_err(|e| OperationDataError::MalformedToken(e.to_string()))?;

    if data.backend_task_id == 0 {
        return Err(OperationDataError::MissingTaskID {
            operation_type: data.operation_type,
        });
    }

    Ok(data)
}
