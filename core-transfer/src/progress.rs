//! Stage reporting for transfers
//!
//! Progress is reported at fixed checkpoints, not per byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Step of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Downloading,
    Uploading,
    Processing,
    Completed,
}

impl TransferStage {
    /// Percentage reported when the stage begins.
    pub fn percent(&self) -> u8 {
        match self {
            TransferStage::Downloading => 0,
            TransferStage::Uploading => 40,
            TransferStage::Processing => 80,
            TransferStage::Completed => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Downloading => "downloading",
            TransferStage::Uploading => "uploading",
            TransferStage::Processing => "processing",
            TransferStage::Completed => "completed",
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notification. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub stage: TransferStage,
    pub percent: u8,
}

impl From<TransferStage> for TransferProgress {
    fn from(stage: TransferStage) -> Self {
        Self {
            stage,
            percent: stage.percent(),
        }
    }
}

/// Caller-supplied progress sink for one transfer.
pub type ProgressFn<'a> = &'a (dyn Fn(TransferProgress) + Send + Sync);

/// Progress of a bulk transfer, reported after each item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkProgress {
    pub completed: usize,
    pub total: usize,
    pub file_id: String,
    pub succeeded: bool,
}

pub type BulkProgressFn<'a> = &'a (dyn Fn(BulkProgress) + Send + Sync);
