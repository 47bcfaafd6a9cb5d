//! Validation status: the verdict the schema validator assigns to an entity.

use serde::{Deserialize, Serialize};

/// Outcome of validating a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    Valid,
    ValidWithWarnings,
    Rejected,
}

impl ValidationStatus {
    /// Whether the entity carries at least one ERROR.
    #[must_use]
    pub fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected)
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::ValidWithWarnings => f.write_str("valid_with_warnings"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}
