//! Process exit codes.

use std::process::ExitCode;

use topomap_domain::error::MapError;

/// Outcome of a command that ran to completion or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    /// Validation errors were found; artifacts may still have been written.
    ValidationFailed = 1,
    DiscoveryFailed = 2,
    SchemaIncompatible = 3,
    /// Storage, IO, configuration or an unresolved version conflict.
    Fatal = 4,
}

impl Status {
    /// Classify an error that aborted a command.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let map_error = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<MapError>());
        match map_error {
            Some(MapError::Discovery(_)) => Self::DiscoveryFailed,
            Some(MapError::SchemaNotFound(_) | MapError::SchemaIncompatible(_)) => {
                Self::SchemaIncompatible
            }
            _ => Self::Fatal,
        }
    }
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        Self::from(status as u8)
    }
}
