//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Request fields default when absent so that a missing field reaches the
//! core and is reported as `empty_parameter` rather than as a JSON-shape
//! rejection.

use chrono::NaiveDate;
use registrar_core::{
    EnrollRequest, PromotionRequest, RegistrarError, Semester, StudentPatch, StudentView, Study,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-checkable kind: `empty_parameter`, `bad_request`,
    /// `not_found` or `internal`.
    pub error: String,
    pub reason: String,
}

impl ErrorResponse {
    /// Internal failures carry a generic reason; the detail goes to the log.
    pub fn from_error(err: &RegistrarError) -> Self {
        let kind = err.kind();
        let reason = if err.is_recoverable() {
            err.reason().to_string()
        } else {
            "internal error".to_string()
        };
        Self {
            error: kind.as_str().to_string(),
            reason,
        }
    }
}

// =============================================================================
// STUDENT REQUESTS
// =============================================================================

/// Enroll request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollBody {
    pub index_number: String,
    pub first_name: String,
    pub last_name: String,
    /// ISO-8601 calendar date, e.g. `1999-12-10`.
    pub birth_date: Option<String>,
    pub study_name: String,
}

impl EnrollBody {
    /// Convert to the core request, parsing the birth date.
    ///
    /// A blank date is left absent (reported as `EmptyParameter` by the
    /// core); a malformed one is a `BadRequest`.
    pub fn to_request(&self) -> Result<EnrollRequest, RegistrarError> {
        let birth_date = match self.birth_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_date(raw)?),
        };
        Ok(EnrollRequest {
            index_number: self.index_number.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birth_date,
            study_name: self.study_name.clone(),
        })
    }
}

/// Parse an ISO-8601 calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, RegistrarError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| RegistrarError::BadRequest(format!("invalid birth_date '{}': {}", raw, e)))
}

/// Update request body. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateBody {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UpdateBody> for StudentPatch {
    fn from(body: UpdateBody) -> Self {
        Self {
            first_name: body.first_name,
            last_name: body.last_name,
        }
    }
}

// =============================================================================
// PROMOTION REQUEST
// =============================================================================

/// Promote request body.
///
/// Semesters are signed so that a negative value is reported as a missing
/// parameter instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoteBody {
    pub study_name: String,
    pub old_semester: Option<i64>,
    pub new_semester: Option<i64>,
}

impl PromoteBody {
    pub fn to_request(&self) -> PromotionRequest {
        PromotionRequest {
            study_name: self.study_name.clone(),
            old_semester: to_semester(self.old_semester),
            new_semester: to_semester(self.new_semester),
        }
    }
}

/// Missing, non-positive or out-of-range values map to semester 0, which the
/// core rejects as `EmptyParameter`.
pub fn to_semester(raw: Option<i64>) -> Semester {
    raw.and_then(|v| u32::try_from(v).ok())
        .map_or(Semester::new(0), Semester::new)
}

// =============================================================================
// STUDY REQUEST
// =============================================================================

/// Add-study request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyBody {
    pub name: String,
}

/// Study as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyJson {
    pub id: u64,
    pub name: String,
}

impl From<&Study> for StudyJson {
    fn from(study: &Study) -> Self {
        Self {
            id: study.id.0,
            name: study.name.clone(),
        }
    }
}

// =============================================================================
// LISTING RESPONSES
// =============================================================================

/// Student listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentListResponse {
    pub students: Vec<StudentView>,
    /// `"No record!"` when the listing is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub message: Option<String>,
}

impl StudentListResponse {
    pub fn new(students: Vec<StudentView>) -> Self {
        let message = students
            .is_empty()
            .then(|| registrar_core::NO_RECORD_MARKER.to_string());
        Self { students, message }
    }
}

/// Delete confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: String,
    pub message: String,
}

impl DeleteResponse {
    pub fn new(index: &str) -> Self {
        Self {
            deleted: index.to_string(),
            message: format!("student {} deleted", index),
        }
    }
}

/// Record counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub studies: usize,
    pub enrollments: usize,
    pub students: usize,
    pub persistent: bool,
    pub target_policy: String,
}
