//! Validation issues: the collected, never-thrown findings of a build.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue severity. `Error` sorts before `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    fn rank(self) -> u8 {
        match self {
            Self::Error => 0,
            Self::Warning => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("WARNING"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// Family an issue code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    StructuralDefect,
    ReferentialError,
    SchemaViolation,
}

/// Enumerated issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    EmptyIdentifier,
    DuplicateConflict,
    AreaCycle,
    SyntheticIdCollision,
    PlatformKeyCollision,
    OrphanDevice,
    OrphanArea,
    NonFiniteAttribute,
    DanglingDeviceReference,
    DanglingAreaReference,
    DanglingAreaParent,
    MissingRequiredAttribute,
    MissingArea,
    CapabilityMismatch,
    InvalidAttributeValue,
    UnknownDomain,
    UnknownCapability,
}

impl IssueCode {
    #[must_use]
    pub fn category(self) -> IssueCategory {
        match self {
            Self::EmptyIdentifier
            | Self::DuplicateConflict
            | Self::AreaCycle
            | Self::SyntheticIdCollision
            | Self::PlatformKeyCollision
            | Self::OrphanDevice
            | Self::OrphanArea
            | Self::NonFiniteAttribute => IssueCategory::StructuralDefect,
            Self::DanglingDeviceReference
            | Self::DanglingAreaReference
            | Self::DanglingAreaParent => IssueCategory::ReferentialError,
            Self::MissingRequiredAttribute
            | Self::MissingArea
            | Self::CapabilityMismatch
            | Self::InvalidAttributeValue
            | Self::UnknownDomain
            | Self::UnknownCapability => IssueCategory::SchemaViolation,
        }
    }

    /// Wire name, also used as the sort key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyIdentifier => "empty_identifier",
            Self::DuplicateConflict => "duplicate_conflict",
            Self::AreaCycle => "area_cycle",
            Self::SyntheticIdCollision => "synthetic_id_collision",
            Self::PlatformKeyCollision => "platform_key_collision",
            Self::OrphanDevice => "orphan_device",
            Self::OrphanArea => "orphan_area",
            Self::NonFiniteAttribute => "non_finite_attribute",
            Self::DanglingDeviceReference => "dangling_device_reference",
            Self::DanglingAreaReference => "dangling_area_reference",
            Self::DanglingAreaParent => "dangling_area_parent",
            Self::MissingRequiredAttribute => "missing_required_attribute",
            Self::MissingArea => "missing_area",
            Self::CapabilityMismatch => "capability_mismatch",
            Self::InvalidAttributeValue => "invalid_attribute_value",
            Self::UnknownDomain => "unknown_domain",
            Self::UnknownCapability => "unknown_capability",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of graph item an issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Entity,
    Device,
    Area,
    Service,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Device => f.write_str("device"),
            Self::Area => f.write_str("area"),
            Self::Service => f.write_str("service"),
        }
    }
}

/// One finding of normalization or validation.
///
/// `subject` is the synthetic id of the item, or its platform id when no
/// synthetic id could be assigned (for instance an empty identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub subject_kind: SubjectKind,
    pub subject: String,
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn error(
        code: IssueCode,
        subject_kind: SubjectKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            code,
            subject_kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(
        code: IssueCode,
        subject_kind: SubjectKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, subject_kind, subject, message)
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    #[must_use]
    pub fn category(&self) -> IssueCategory {
        self.code.category()
    }

    fn sort_key(&self, other: &Self) -> Ordering {
        self.severity
            .rank()
            .cmp(&other.severity.rank())
            .then_with(|| self.subject.cmp(&other.subject))
            .then_with(|| self.code.as_str().cmp(other.code.as_str()))
            .then_with(|| self.subject_kind.cmp(&other.subject_kind))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} {}: {}",
            self.severity, self.code, self.subject_kind, self.subject, self.message
        )
    }
}

/// Sort issues into their reproducible order and drop exact duplicates.
///
/// Order: severity (errors first), subject id, issue code, then kind and
/// message as tie-breakers.
pub fn sort_issues(issues: &mut Vec<ValidationIssue>) {
    issues.sort_by(ValidationIssue::sort_key);
    issues.dedup();
}

/// Whether any issue is an ERROR.
#[must_use]
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(ValidationIssue::is_error)
}
