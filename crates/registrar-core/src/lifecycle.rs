//! # Student Lifecycle
//!
//! Enroll, update, delete and read single students.
//!
//! Enroll is the sole creation path: every student is enrolled into the
//! first semester of an existing study when it is created.

use crate::primitives::FIRST_SEMESTER;
use crate::repository::{Repository, RepositoryRead};
use crate::resolver::EnrollmentResolver;
use crate::{
    EnrollRequest, EnrollmentSummary, IndexNumber, RegistrarError, Student, StudentPatch,
    StudentView,
};
use chrono::{DateTime, Utc};

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// The StudentLifecycle enforces presence, uniqueness and existence rules
/// for single-student operations.
pub struct StudentLifecycle;

impl StudentLifecycle {
    /// Validate that every Enroll field is present.
    ///
    /// Returns `EmptyParameter` naming the first missing field.
    pub fn validate(request: &EnrollRequest) -> Result<(), RegistrarError> {
        let required = [
            ("index_number", request.index_number.as_str()),
            ("first_name", request.first_name.as_str()),
            ("last_name", request.last_name.as_str()),
            ("study_name", request.study_name.as_str()),
        ];
        for (field, value) in required {
            if is_blank(value) {
                return Err(RegistrarError::EmptyParameter(format!("{} is required", field)));
            }
        }
        if request.birth_date.is_none() {
            return Err(RegistrarError::EmptyParameter(
                "birth_date is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Enroll a new student into semester 1 of `request.study_name`.
    ///
    /// # Errors
    /// - `EmptyParameter` if a field is missing or blank
    /// - `BadRequest` if the index number is already taken
    /// - `NotFound` if the study does not exist
    pub fn enroll<R: Repository + ?Sized>(
        repo: &mut R,
        request: &EnrollRequest,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentSummary, RegistrarError> {
        Self::validate(request)?;
        let birth_date = request.birth_date.ok_or_else(|| {
            RegistrarError::EmptyParameter("birth_date is required".to_string())
        })?;

        let index = IndexNumber::new(request.index_number.trim());
        if repo.find_student(&index)?.is_some() {
            return Err(RegistrarError::BadRequest(format!(
                "student {} already exists",
                index
            )));
        }

        let resolution = EnrollmentResolver::resolve_or_create(
            &mut *repo,
            &request.study_name,
            FIRST_SEMESTER,
            now,
        )?;

        let student = Student {
            index_number: index,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            birth_date,
            enrollment_id: resolution.enrollment.id,
        };
        repo.insert_student(&student)?;

        Ok(EnrollmentSummary {
            first_name: student.first_name,
            last_name: student.last_name,
            semester: resolution.enrollment.semester.value(),
            study: resolution.study.name,
        })
    }

    /// Apply a partial update to a student's name fields.
    ///
    /// Absent patch fields are left untouched. A field that is present but
    /// blank is a `BadRequest`.
    pub fn update<R: Repository + ?Sized>(
        repo: &mut R,
        index: &IndexNumber,
        patch: &StudentPatch,
    ) -> Result<StudentView, RegistrarError> {
        if repo.find_student(index)?.is_none() {
            return Err(RegistrarError::NotFound(format!(
                "student {} does not exist",
                index
            )));
        }

        for (field, value) in [
            ("first_name", patch.first_name.as_deref()),
            ("last_name", patch.last_name.as_deref()),
        ] {
            if value.is_some_and(is_blank) {
                return Err(RegistrarError::BadRequest(format!(
                    "{} cannot be blank",
                    field
                )));
            }
        }

        if !patch.is_empty() {
            repo.update_student_fields(index, patch)?;
        }

        let student = repo.find_student(index)?.ok_or_else(|| {
            RegistrarError::NotFound(format!("student {} does not exist", index))
        })?;
        repo.project(&student)
    }

    /// Remove a student. Enrollments and studies are never touched.
    pub fn delete<R: Repository + ?Sized>(
        repo: &mut R,
        index: &IndexNumber,
    ) -> Result<(), RegistrarError> {
        if index.is_blank() {
            return Err(RegistrarError::EmptyParameter(
                "index_number is required".to_string(),
            ));
        }
        if !repo.delete_student(index)? {
            return Err(RegistrarError::NotFound(format!(
                "student {} does not exist",
                index
            )));
        }
        Ok(())
    }

    /// The joined projection of one student, or `None`.
    pub fn get_one<R: RepositoryRead + ?Sized>(
        repo: &R,
        index: &IndexNumber,
    ) -> Result<Option<StudentView>, RegistrarError> {
        match repo.find_student(index)? {
            Some(student) => repo.project(&student).map(Some),
            None => Ok(None),
        }
    }

    /// The joined projection of every student. Empty is a valid result.
    pub fn get_all<R: RepositoryRead + ?Sized>(
        repo: &R,
    ) -> Result<Vec<StudentView>, RegistrarError> {
        repo.list_students()
    }
}

// =============================================================================
// TESTS
// =============================================================================
