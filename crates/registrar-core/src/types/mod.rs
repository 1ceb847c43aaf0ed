//! # Core Type Definitions
//!
//! This module contains all core types for the Registrar enrollment engine:
//! - Record identifiers (`StudyId`, `EnrollmentId`, `IndexNumber`, `Semester`)
//! - Stored records (`Study`, `Enrollment`, `Student`)
//! - Operation inputs (`EnrollRequest`, `StudentPatch`, `PromotionRequest`)
//! - Projections returned to callers (`StudentView`, `EnrollmentSummary`,
//!   `PromotionSummary`)
//! - Error types (`RegistrarError`, `ErrorKind`)
//!
//! ## Ordering Guarantees
//!
//! Every identifier implements `Ord` so that listings coming out of either
//! storage backend are ordered the same way.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Generated identifier of a study program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudyId(pub u64);

/// Generated identifier of an enrollment.
///
/// Allocated as `max(existing) + 1` across every enrollment, not per study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub u64);

impl EnrollmentId {
    /// The id following this one, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl StudyId {
    /// The id following this one, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Semester number. Valid semesters start at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Semester(pub u32);

impl Semester {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// A semester is valid when it is at least 1.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally supplied student identifier, the Student primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexNumber(pub String);

impl IndexNumber {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the index is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for IndexNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// An academic program, identified by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub id: StudyId,
    pub name: String,
}

impl Study {
    #[must_use]
    pub fn new(id: StudyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The binding of a study to one semester.
///
/// At most one enrollment exists per `(study_id, semester)` pair.
/// Enrollments are never mutated or deleted once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub study_id: StudyId,
    pub semester: Semester,
    pub start_date: DateTime<Utc>,
}

/// A student record. Always bound to exactly one enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub index_number: IndexNumber,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub enrollment_id: EnrollmentId,
}

// =============================================================================
// OPERATION INPUTS
// =============================================================================

/// Input of the Enroll operation.
///
/// Every field is required; `birth_date` is optional here only so that a
/// missing value can be reported as `EmptyParameter`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub index_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub study_name: String,
}

/// Partial update of a student's name fields.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl StudentPatch {
    /// True when the patch carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }

    /// Apply the present fields to `student`.
    pub fn apply_to(&self, student: &mut Student) {
        if let Some(first) = &self.first_name {
            student.first_name.clone_from(first);
        }
        if let Some(last) = &self.last_name {
            student.last_name.clone_from(last);
        }
    }
}

/// Input of the Promote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub study_name: String,
    pub old_semester: Semester,
    pub new_semester: Semester,
}

// =============================================================================
// PROJECTIONS
// =============================================================================

/// The externally returned shape of a student: Student joined with its
/// Enrollment and Study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentView {
    pub index_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub semester: u32,
    pub study: String,
}

impl StudentView {
    #[must_use]
    pub fn new(student: &Student, enrollment: &Enrollment, study: &Study) -> Self {
        Self {
            index_number: student.index_number.0.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            birth_date: student.birth_date,
            semester: enrollment.semester.value(),
            study: study.name.clone(),
        }
    }
}

/// Result of a successful Enroll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSummary {
    pub first_name: String,
    pub last_name: String,
    pub semester: u32,
    pub study: String,
}

/// One promoted (or demoted) student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionSummary {
    pub first_name: String,
    pub last_name: String,
    pub study: String,
    pub old_semester: u32,
    pub new_semester: u32,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Registrar system.
///
/// - `EmptyParameter`, `BadRequest` and `NotFound` are recoverable by the
///   caller and carry a short reason string
/// - Everything else is fatal to the current operation; the enclosing
///   transaction is rolled back
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// A required input is missing or blank.
    #[error("Empty parameter: {0}")]
    EmptyParameter(String),

    /// The input is present but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique key or index in the store rejected a write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A stored record points at a record that does not exist.
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Classification of a `RegistrarError` for the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyParameter,
    BadRequest,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// Machine-checkable name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyParameter => "empty_parameter",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

impl RegistrarError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyParameter(_) => ErrorKind::EmptyParameter,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConstraintViolation(_)
            | Self::DanglingReference(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => ErrorKind::Internal,
        }
    }

    /// True for the three caller-recoverable kinds.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }

    /// The short reason carried by the error.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::EmptyParameter(r)
            | Self::BadRequest(r)
            | Self::NotFound(r)
            | Self::ConstraintViolation(r)
            | Self::DanglingReference(r)
            | Self::SerializationError(r)
            | Self::IoError(r) => r,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
