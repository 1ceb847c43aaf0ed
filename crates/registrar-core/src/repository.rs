//! # Repository
//!
//! Raw record access for Study, Enrollment and Student.
//!
//! The repository owns no business rules. Every call runs inside a
//! transaction supplied by the caller: the traits are implemented by the
//! transaction objects of each storage backend, never by the stores
//! themselves.
//!
//! Both traits are object-safe so that the `Registry` can run the same
//! component code against `&mut dyn Repository` whatever the backend.

use crate::primitives::{FIRST_ENROLLMENT_ID, FIRST_STUDY_ID};
use crate::{
    Enrollment, EnrollmentId, IndexNumber, RegistrarError, Semester, Student, StudentPatch,
    StudentView, Study, StudyId,
};

/// Read access to the registry records.
pub trait RepositoryRead {
    /// Lookup a student by index number.
    fn find_student(&self, index: &IndexNumber) -> Result<Option<Student>, RegistrarError>;

    /// All students, ordered by index number.
    fn all_students(&self) -> Result<Vec<Student>, RegistrarError>;

    /// Lookup a study by id.
    fn find_study(&self, id: StudyId) -> Result<Option<Study>, RegistrarError>;

    /// Lookup a study by its unique name.
    fn find_study_by_name(&self, name: &str) -> Result<Option<Study>, RegistrarError>;

    /// All studies, ordered by id.
    fn list_studies(&self) -> Result<Vec<Study>, RegistrarError>;

    /// Lookup an enrollment by id.
    fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RegistrarError>;

    /// Lookup the enrollment of a `(study, semester)` pair.
    fn find_enrollment(
        &self,
        study_id: StudyId,
        semester: Semester,
    ) -> Result<Option<Enrollment>, RegistrarError>;

    /// All enrollments, ordered by id.
    fn list_enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError>;

    /// Students bound to an enrollment, ordered by index number.
    fn students_in_enrollment(&self, id: EnrollmentId) -> Result<Vec<Student>, RegistrarError>;

    /// Join a student with its enrollment and study.
    ///
    /// A student whose enrollment or study is missing breaks the referential
    /// invariant and yields `DanglingReference`.
    fn project(&self, student: &Student) -> Result<StudentView, RegistrarError> {
        let enrollment = self.get_enrollment(student.enrollment_id)?.ok_or_else(|| {
            RegistrarError::DanglingReference(format!(
                "student {} references missing enrollment {}",
                student.index_number, student.enrollment_id.0
            ))
        })?;
        let study = self.find_study(enrollment.study_id)?.ok_or_else(|| {
            RegistrarError::DanglingReference(format!(
                "enrollment {} references missing study {}",
                enrollment.id.0, enrollment.study_id.0
            ))
        })?;
        Ok(StudentView::new(student, &enrollment, &study))
    }

    /// Every student joined with its enrollment and study.
    fn list_students(&self) -> Result<Vec<StudentView>, RegistrarError> {
        self.all_students()?
            .iter()
            .map(|student| self.project(student))
            .collect()
    }
}

/// Write access to the registry records.
pub trait Repository: RepositoryRead {
    /// The largest enrollment id in use, if any.
    fn max_enrollment_id(&self) -> Result<Option<EnrollmentId>, RegistrarError>;

    /// The largest study id in use, if any.
    fn max_study_id(&self) -> Result<Option<StudyId>, RegistrarError>;

    /// Insert a study. Duplicate ids or names are a `ConstraintViolation`.
    fn insert_study(&mut self, study: &Study) -> Result<(), RegistrarError>;

    /// Insert an enrollment. A duplicate id or `(study, semester)` pair is a
    /// `ConstraintViolation`.
    fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), RegistrarError>;

    /// Insert a student. A duplicate index number is a `ConstraintViolation`.
    fn insert_student(&mut self, student: &Student) -> Result<(), RegistrarError>;

    /// Apply the present fields of `patch`. Returns `false` if the student
    /// does not exist.
    fn update_student_fields(
        &mut self,
        index: &IndexNumber,
        patch: &StudentPatch,
    ) -> Result<bool, RegistrarError>;

    /// Point one student at another enrollment. Returns `false` if the
    /// student does not exist.
    ///
    /// Single-row form of [`Repository::reassign_all`], which promotion uses
    /// to move a whole enrollment in one batch.
    fn reassign_enrollment(
        &mut self,
        index: &IndexNumber,
        enrollment_id: EnrollmentId,
    ) -> Result<bool, RegistrarError>;

    /// Move every student of `from` to `to` in one batch. Returns the number
    /// of students now bound to `to` that came from `from`, which is every
    /// member of `from` when both are the same enrollment.
    fn reassign_all(&mut self, from: EnrollmentId, to: EnrollmentId)
    -> Result<usize, RegistrarError>;

    /// Remove a student. Returns `false` if the student does not exist.
    fn delete_student(&mut self, index: &IndexNumber) -> Result<bool, RegistrarError>;

    /// Next enrollment id: `max(existing) + 1`, scoped to all enrollments.
    ///
    /// Only race-free because write transactions are serialized by both
    /// backends; the `(study, semester)` index is the backstop.
    fn next_enrollment_id(&self) -> Result<EnrollmentId, RegistrarError> {
        Ok(self
            .max_enrollment_id()?
            .map_or(FIRST_ENROLLMENT_ID, EnrollmentId::next))
    }

    /// Next study id: `max(existing) + 1`.
    fn next_study_id(&self) -> Result<StudyId, RegistrarError> {
        Ok(self.max_study_id()?.map_or(FIRST_STUDY_ID, StudyId::next))
    }
}
