use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one submission batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Compliant,
    RejectedDataQuality,
    RejectedStructural,
    /// A mandatory binding had no data; the batch stopped before validation.
    Aborted,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Compliant => "COMPLIANT",
            BatchStatus::RejectedDataQuality => "REJECTED_DATA_QUALITY",
            BatchStatus::RejectedStructural => "REJECTED_STRUCTURAL",
            BatchStatus::Aborted => "ABORTED",
        }
    }

    pub fn is_compliant(self) -> bool {
        self == BatchStatus::Compliant
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
