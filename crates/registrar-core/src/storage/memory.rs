//! # In-Memory Registry Storage
//!
//! A volatile store backed by `BTreeMap`s.
//!
//! A transaction holds the store mutex for its whole lifetime and works on
//! a private copy of the tables. `commit()` swaps the copy in; dropping the
//! transaction discards it. Writers are therefore serialized, the same
//! guarantee redb gives the persistent backend.

use crate::repository::{Repository, RepositoryRead};
use crate::{
    Enrollment, EnrollmentId, IndexNumber, RegistrarError, Semester, Student, StudentPatch, Study,
    StudyId,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// The tables of the in-memory store.
#[derive(Debug, Clone, Default)]
struct Tables {
    studies: BTreeMap<StudyId, Study>,
    study_names: BTreeMap<String, StudyId>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    enrollment_index: BTreeMap<(StudyId, Semester), EnrollmentId>,
    students: BTreeMap<IndexNumber, Student>,
}

/// In-memory registry store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RegistrarError> {
        self.tables
            .lock()
            .map_err(|_| RegistrarError::IoError("memory store lock poisoned".to_string()))
    }

    /// Begin a write transaction.
    pub fn begin(&self) -> Result<MemoryTxn<'_>, RegistrarError> {
        let guard = self.lock()?;
        let working = guard.clone();
        Ok(MemoryTxn { guard, working })
    }

    /// Take a read snapshot of the current committed state.
    pub fn read(&self) -> Result<MemorySnapshot, RegistrarError> {
        let guard = self.lock()?;
        Ok(MemorySnapshot {
            tables: guard.clone(),
        })
    }
}

/// A write transaction on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTxn<'a> {
    guard: MutexGuard<'a, Tables>,
    working: Tables,
}

impl MemoryTxn<'_> {
    /// Publish the working copy.
    pub fn commit(self) -> Result<(), RegistrarError> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

/// A read-only snapshot of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySnapshot {
    tables: Tables,
}

// =============================================================================
// SHARED READ PATH
// =============================================================================

impl Tables {
    fn students_in(&self, id: EnrollmentId) -> Vec<Student> {
        self.students
            .values()
            .filter(|s| s.enrollment_id == id)
            .cloned()
            .collect()
    }

    fn study_by_name(&self, name: &str) -> Option<Study> {
        self.study_names
            .get(name)
            .and_then(|id| self.studies.get(id))
            .cloned()
    }

    fn enrollment_for(&self, study_id: StudyId, semester: Semester) -> Option<Enrollment> {
        self.enrollment_index
            .get(&(study_id, semester))
            .and_then(|id| self.enrollments.get(id))
            .cloned()
    }
}

/// Implements `RepositoryRead` for a type exposing `fn tables(&self) -> &Tables`.
macro_rules! impl_memory_read {
    ($ty:ty) => {
        impl RepositoryRead for $ty {
            fn find_student(
                &self,
                index: &IndexNumber,
            ) -> Result<Option<Student>, RegistrarError> {
                Ok(self.tables().students.get(index).cloned())
            }

            fn all_students(&self) -> Result<Vec<Student>, RegistrarError> {
                Ok(self.tables().students.values().cloned().collect())
            }

            fn find_study(&self, id: StudyId) -> Result<Option<Study>, RegistrarError> {
                Ok(self.tables().studies.get(&id).cloned())
            }

            fn find_study_by_name(&self, name: &str) -> Result<Option<Study>, RegistrarError> {
                Ok(self.tables().study_by_name(name))
            }

            fn list_studies(&self) -> Result<Vec<Study>, RegistrarError> {
                Ok(self.tables().studies.values().cloned().collect())
            }

            fn get_enrollment(
                &self,
                id: EnrollmentId,
            ) -> Result<Option<Enrollment>, RegistrarError> {
                Ok(self.tables().enrollments.get(&id).cloned())
            }

            fn find_enrollment(
                &self,
                study_id: StudyId,
                semester: Semester,
            ) -> Result<Option<Enrollment>, RegistrarError> {
                Ok(self.tables().enrollment_for(study_id, semester))
            }

            fn list_enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
                Ok(self.tables().enrollments.values().cloned().collect())
            }

            fn students_in_enrollment(
                &self,
                id: EnrollmentId,
            ) -> Result<Vec<Student>, RegistrarError> {
                Ok(self.tables().students_in(id))
            }
        }
    };
}

impl MemorySnapshot {
    fn tables(&self) -> &Tables {
        &self.tables
    }
}

impl MemoryTxn<'_> {
    fn tables(&self) -> &Tables {
        &self.working
    }
}

impl_memory_read!(MemorySnapshot);
impl_memory_read!(MemoryTxn<'_>);

// =============================================================================
// WRITE PATH
// =============================================================================

impl Repository for MemoryTxn<'_> {
    fn max_enrollment_id(&self) -> Result<Option<EnrollmentId>, RegistrarError> {
        Ok(self.working.enrollments.keys().next_back().copied())
    }

    fn max_study_id(&self) -> Result<Option<StudyId>, RegistrarError> {
        Ok(self.working.studies.keys().next_back().copied())
    }

    fn insert_study(&mut self, study: &Study) -> Result<(), RegistrarError> {
        if self.working.studies.contains_key(&study.id) {
            return Err(RegistrarError::ConstraintViolation(format!(
                "study id {} already exists",
                study.id.0
            )));
        }
        if self.working.study_names.contains_key(&study.name) {
            return Err(RegistrarError::ConstraintViolation(format!(
                "study name {} already exists",
                study.name
            )));
        }
        self.working.study_names.insert(study.name.clone(), study.id);
        self.working.studies.insert(study.id, study.clone());
        Ok(())
    }

    fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), RegistrarError> {
        let key = (enrollment.study_id, enrollment.semester);
        if self.working.enrollments.contains_key(&enrollment.id) {
            return Err(RegistrarError::ConstraintViolation(format!(
                "enrollment id {} already exists",
                enrollment.id.0
            )));
        }
        if self.working.enrollment_index.contains_key(&key) {
            return Err(RegistrarError::ConstraintViolation(format!(
                "study {} already has an enrollment for semester {}",
                enrollment.study_id.0, enrollment.semester
            )));
        }
        self.working.enrollment_index.insert(key, enrollment.id);
        self.working
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(())
    }

    fn insert_student(&mut self, student: &Student) -> Result<(), RegistrarError> {
        if self.working.students.contains_key(&student.index_number) {
            return Err(RegistrarError::ConstraintViolation(format!(
                "student {} already exists",
                student.index_number
            )));
        }
        self.working
            .students
            .insert(student.index_number.clone(), student.clone());
        Ok(())
    }

    fn update_student_fields(
        &mut self,
        index: &IndexNumber,
        patch: &StudentPatch,
    ) -> Result<bool, RegistrarError> {
        match self.working.students.get_mut(index) {
            Some(student) => {
                patch.apply_to(student);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reassign_enrollment(
        &mut self,
        index: &IndexNumber,
        enrollment_id: EnrollmentId,
    ) -> Result<bool, RegistrarError> {
        match self.working.students.get_mut(index) {
            Some(student) => {
                student.enrollment_id = enrollment_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reassign_all(
        &mut self,
        from: EnrollmentId,
        to: EnrollmentId,
    ) -> Result<usize, RegistrarError> {
        let mut moved = 0usize;
        for student in self
            .working
            .students
            .values_mut()
            .filter(|s| s.enrollment_id == from)
        {
            student.enrollment_id = to;
            moved = moved.saturating_add(1);
        }
        Ok(moved)
    }

    fn delete_student(&mut self, index: &IndexNumber) -> Result<bool, RegistrarError> {
        Ok(self.working.students.remove(index).is_some())
    }
}

// =============================================================================
// TESTS
// =============================================================================
