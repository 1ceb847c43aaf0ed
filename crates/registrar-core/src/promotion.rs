//! # Promotion Engine
//!
//! Bulk-moves every student of one enrollment to the enrollment of another
//! semester of the same study.
//!
//! The whole move runs against one repository transaction: either every
//! student ends up on the target enrollment or nothing changes. Demotion
//! (a lower target semester) is permitted.

use crate::repository::Repository;
use crate::resolver::EnrollmentResolver;
use crate::{PromotionRequest, PromotionSummary, RegistrarError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with the target enrollment when no student moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEnrollmentPolicy {
    /// Create the target enrollment even if the source one is empty.
    #[default]
    AlwaysCreate,
    /// Leave the store untouched when there is nobody to move.
    OnlyWhenStudentsMoved,
}

impl TargetEnrollmentPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysCreate => "always_create",
            Self::OnlyWhenStudentsMoved => "only_when_students_moved",
        }
    }
}

impl fmt::Display for TargetEnrollmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetEnrollmentPolicy {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always_create" | "always-create" => Ok(Self::AlwaysCreate),
            "only_when_students_moved" | "only-when-students-moved" => {
                Ok(Self::OnlyWhenStudentsMoved)
            }
            other => Err(RegistrarError::BadRequest(format!(
                "unknown target enrollment policy: {}",
                other
            ))),
        }
    }
}

/// The PromotionEngine moves whole semesters.
pub struct PromotionEngine;

impl PromotionEngine {
    /// Check presence and sanity of a promotion request.
    pub fn validate(request: &PromotionRequest) -> Result<(), RegistrarError> {
        if request.study_name.trim().is_empty() {
            return Err(RegistrarError::EmptyParameter(
                "study_name is required".to_string(),
            ));
        }
        if !request.old_semester.is_valid() {
            return Err(RegistrarError::EmptyParameter(
                "old_semester is required".to_string(),
            ));
        }
        if !request.new_semester.is_valid() {
            return Err(RegistrarError::EmptyParameter(
                "new_semester is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Promote every student of `(study, old_semester)` to `new_semester`.
    ///
    /// Returns one summary per moved student, ordered by index number. An
    /// empty source enrollment yields an empty list. Equal semesters rebind
    /// the students to their own enrollment and still report each of them.
    ///
    /// # Errors
    /// - `EmptyParameter` if the study name is blank or a semester is below 1
    /// - `NotFound` if the study or its `old_semester` enrollment is unknown
    pub fn promote<R: Repository + ?Sized>(
        repo: &mut R,
        request: &PromotionRequest,
        policy: TargetEnrollmentPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<PromotionSummary>, RegistrarError> {
        Self::validate(request)?;

        let source =
            EnrollmentResolver::find_existing(&*repo, &request.study_name, request.old_semester)?;
        let students = repo.students_in_enrollment(source.enrollment.id)?;

        if students.is_empty() && policy == TargetEnrollmentPolicy::OnlyWhenStudentsMoved {
            return Ok(Vec::new());
        }

        let target = EnrollmentResolver::resolve_or_create(
            &mut *repo,
            &request.study_name,
            request.new_semester,
            now,
        )?;

        let moved = repo.reassign_all(source.enrollment.id, target.enrollment.id)?;
        if moved != students.len() {
            return Err(RegistrarError::ConstraintViolation(format!(
                "expected to move {} students, moved {}",
                students.len(),
                moved
            )));
        }

        Ok(students
            .into_iter()
            .map(|student| PromotionSummary {
                first_name: student.first_name,
                last_name: student.last_name,
                study: source.study.name.clone(),
                old_semester: source.enrollment.semester.value(),
                new_semester: target.enrollment.semester.value(),
            })
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
