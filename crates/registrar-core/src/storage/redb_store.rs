//! # redb-backed Registry Storage
//!
//! A disk-backed registry store using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records are postcard-encoded. Secondary tables carry the unique indexes
//! (`study name -> id`, `(study, semester) -> enrollment`) and the
//! `enrollment -> students` membership used for batch promotion.
//!
//! Write transactions are serialized by redb, so the `max + 1` id
//! allocation done by the resolver cannot interleave with another writer.

use crate::repository::{Repository, RepositoryRead};
use crate::{
    Enrollment, EnrollmentId, IndexNumber, RegistrarError, Semester, Student, StudentPatch, Study,
    StudyId,
};
use redb::{
    Database, MultimapTableDefinition, ReadTransaction, ReadableDatabase, ReadableMultimapTable,
    ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::path::Path;

/// Table for studies: StudyId(u64) -> serialized Study bytes
const STUDIES: TableDefinition<u64, &[u8]> = TableDefinition::new("studies");

/// Unique index on study names: name -> StudyId(u64)
const STUDY_NAMES: TableDefinition<&str, u64> = TableDefinition::new("study_names");

/// Table for enrollments: EnrollmentId(u64) -> serialized Enrollment bytes
const ENROLLMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("enrollments");

/// Unique index: (StudyId, Semester) -> EnrollmentId
const ENROLLMENT_INDEX: TableDefinition<(u64, u32), u64> =
    TableDefinition::new("enrollment_index");

/// Table for students: index number -> serialized Student bytes
const STUDENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("students");

/// Membership: EnrollmentId -> index numbers of the students bound to it
const ENROLLMENT_MEMBERS: MultimapTableDefinition<u64, &str> =
    MultimapTableDefinition::new("enrollment_members");

fn io_err(e: impl Display) -> RegistrarError {
    RegistrarError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RegistrarError> {
    postcard::to_allocvec(value).map_err(|e| RegistrarError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RegistrarError> {
    postcard::from_bytes(bytes).map_err(|e| RegistrarError::SerializationError(e.to_string()))
}

/// A disk-backed registry store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a registry database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistrarError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(STUDIES).map_err(io_err)?;
            let _ = write_txn.open_table(STUDY_NAMES).map_err(io_err)?;
            let _ = write_txn.open_table(ENROLLMENTS).map_err(io_err)?;
            let _ = write_txn.open_table(ENROLLMENT_INDEX).map_err(io_err)?;
            let _ = write_txn.open_table(STUDENTS).map_err(io_err)?;
            let _ = write_txn
                .open_multimap_table(ENROLLMENT_MEMBERS)
                .map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Begin a write transaction. Blocks while another writer is active.
    pub fn begin(&self) -> Result<RedbTxn, RegistrarError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        Ok(RedbTxn { txn })
    }

    /// Begin a read-only snapshot.
    pub fn read(&self) -> Result<RedbSnapshot, RegistrarError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        Ok(RedbSnapshot { txn })
    }
}

/// A write transaction on a [`RedbStore`].
///
/// Dropping it without `commit()` aborts every write it made.
pub struct RedbTxn {
    txn: WriteTransaction,
}

impl RedbTxn {
    /// Durably commit every write made in this transaction.
    pub fn commit(self) -> Result<(), RegistrarError> {
        self.txn.commit().map_err(io_err)
    }
}

/// A read-only snapshot of a [`RedbStore`].
pub struct RedbSnapshot {
    txn: ReadTransaction,
}

// =============================================================================
// SHARED READ PATH
// =============================================================================

/// Implements `RepositoryRead` for a wrapper whose `txn` field is either a
/// `ReadTransaction` or a `WriteTransaction`.
macro_rules! impl_redb_read {
    ($ty:ty) => {
        impl RepositoryRead for $ty {
            fn find_student(
                &self,
                index: &IndexNumber,
            ) -> Result<Option<Student>, RegistrarError> {
                let table = self.txn.open_table(STUDENTS).map_err(io_err)?;
                let record = table.get(index.as_str()).map_err(io_err)?;
                record.map(|bytes| decode(bytes.value())).transpose()
            }

            fn all_students(&self) -> Result<Vec<Student>, RegistrarError> {
                let table = self.txn.open_table(STUDENTS).map_err(io_err)?;
                let mut students = Vec::new();
                for entry in table.iter().map_err(io_err)? {
                    let (_, value) = entry.map_err(io_err)?;
                    students.push(decode(value.value())?);
                }
                Ok(students)
            }

            fn find_study(&self, id: StudyId) -> Result<Option<Study>, RegistrarError> {
                let table = self.txn.open_table(STUDIES).map_err(io_err)?;
                let record = table.get(id.0).map_err(io_err)?;
                record.map(|bytes| decode(bytes.value())).transpose()
            }

            fn find_study_by_name(&self, name: &str) -> Result<Option<Study>, RegistrarError> {
                let names = self.txn.open_table(STUDY_NAMES).map_err(io_err)?;
                let id = names.get(name).map_err(io_err)?.map(|v| v.value());
                match id {
                    Some(id) => self.find_study(StudyId(id)),
                    None => Ok(None),
                }
            }

            fn list_studies(&self) -> Result<Vec<Study>, RegistrarError> {
                let table = self.txn.open_table(STUDIES).map_err(io_err)?;
                let mut studies = Vec::new();
                for entry in table.iter().map_err(io_err)? {
                    let (_, value) = entry.map_err(io_err)?;
                    studies.push(decode(value.value())?);
                }
                Ok(studies)
            }

            fn get_enrollment(
                &self,
                id: EnrollmentId,
            ) -> Result<Option<Enrollment>, RegistrarError> {
                let table = self.txn.open_table(ENROLLMENTS).map_err(io_err)?;
                let record = table.get(id.0).map_err(io_err)?;
                record.map(|bytes| decode(bytes.value())).transpose()
            }

            fn find_enrollment(
                &self,
                study_id: StudyId,
                semester: Semester,
            ) -> Result<Option<Enrollment>, RegistrarError> {
                let index = self.txn.open_table(ENROLLMENT_INDEX).map_err(io_err)?;
                let id = index
                    .get((study_id.0, semester.0))
                    .map_err(io_err)?
                    .map(|v| v.value());
                match id {
                    Some(id) => self.get_enrollment(EnrollmentId(id)),
                    None => Ok(None),
                }
            }

            fn list_enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
                let table = self.txn.open_table(ENROLLMENTS).map_err(io_err)?;
                let mut enrollments = Vec::new();
                for entry in table.iter().map_err(io_err)? {
                    let (_, value) = entry.map_err(io_err)?;
                    enrollments.push(decode(value.value())?);
                }
                Ok(enrollments)
            }

            fn students_in_enrollment(
                &self,
                id: EnrollmentId,
            ) -> Result<Vec<Student>, RegistrarError> {
                let members = self
                    .txn
                    .open_multimap_table(ENROLLMENT_MEMBERS)
                    .map_err(io_err)?;
                let table = self.txn.open_table(STUDENTS).map_err(io_err)?;

                let mut students = Vec::new();
                for member in members.get(id.0).map_err(io_err)? {
                    let member = member.map_err(io_err)?;
                    let index = member.value();
                    let record = table.get(index).map_err(io_err)?.ok_or_else(|| {
                        RegistrarError::DanglingReference(format!(
                            "enrollment {} lists missing student {}",
                            id.0, index
                        ))
                    })?;
                    students.push(decode(record.value())?);
                }
                Ok(students)
            }
        }
    };
}

impl_redb_read!(RedbSnapshot);
impl_redb_read!(RedbTxn);

// =============================================================================
// WRITE PATH
// =============================================================================

impl Repository for RedbTxn {
    fn max_enrollment_id(&self) -> Result<Option<EnrollmentId>, RegistrarError> {
        let table = self.txn.open_table(ENROLLMENTS).map_err(io_err)?;
        let last = table.last().map_err(io_err)?;
        Ok(last.map(|(key, _)| EnrollmentId(key.value())))
    }

    fn max_study_id(&self) -> Result<Option<StudyId>, RegistrarError> {
        let table = self.txn.open_table(STUDIES).map_err(io_err)?;
        let last = table.last().map_err(io_err)?;
        Ok(last.map(|(key, _)| StudyId(key.value())))
    }

    fn insert_study(&mut self, study: &Study) -> Result<(), RegistrarError> {
        let bytes = encode(study)?;
        let mut studies = self.txn.open_table(STUDIES).map_err(io_err)?;
        let mut names = self.txn.open_table(STUDY_NAMES).map_err(io_err)?;

        if studies.get(study.id.0).map_err(io_err)?.is_some() {
            return Err(RegistrarError::ConstraintViolation(format!(
                "study id {} already exists",
                study.id.0
            )));
        }
        if names.get(study.name.as_str()).map_err(io_err)?.is_some() {
            return Err(RegistrarError::ConstraintViolation(format!(
                "study name {} already exists",
                study.name
            )));
        }

        studies
            .insert(study.id.0, bytes.as_slice())
            .map_err(io_err)?;
        names
            .insert(study.name.as_str(), study.id.0)
            .map_err(io_err)?;
        Ok(())
    }

    fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), RegistrarError> {
        let bytes = encode(enrollment)?;
        let key = (enrollment.study_id.0, enrollment.semester.0);
        let mut enrollments = self.txn.open_table(ENROLLMENTS).map_err(io_err)?;
        let mut index = self.txn.open_table(ENROLLMENT_INDEX).map_err(io_err)?;

        if enrollments.get(enrollment.id.0).map_err(io_err)?.is_some() {
            return Err(RegistrarError::ConstraintViolation(format!(
                "enrollment id {} already exists",
                enrollment.id.0
            )));
        }
        if index.get(key).map_err(io_err)?.is_some() {
            return Err(RegistrarError::ConstraintViolation(format!(
                "study {} already has an enrollment for semester {}",
                enrollment.study_id.0, enrollment.semester
            )));
        }

        enrollments
            .insert(enrollment.id.0, bytes.as_slice())
            .map_err(io_err)?;
        index.insert(key, enrollment.id.0).map_err(io_err)?;
        Ok(())
    }

    fn insert_student(&mut self, student: &Student) -> Result<(), RegistrarError> {
        let bytes = encode(student)?;
        let index = student.index_number.as_str();
        let mut students = self.txn.open_table(STUDENTS).map_err(io_err)?;
        let mut members = self
            .txn
            .open_multimap_table(ENROLLMENT_MEMBERS)
            .map_err(io_err)?;

        if students.get(index).map_err(io_err)?.is_some() {
            return Err(RegistrarError::ConstraintViolation(format!(
                "student {} already exists",
                student.index_number
            )));
        }

        students.insert(index, bytes.as_slice()).map_err(io_err)?;
        members
            .insert(student.enrollment_id.0, index)
            .map_err(io_err)?;
        Ok(())
    }

    fn update_student_fields(
        &mut self,
        index: &IndexNumber,
        patch: &StudentPatch,
    ) -> Result<bool, RegistrarError> {
        let mut students = self.txn.open_table(STUDENTS).map_err(io_err)?;
        let current: Option<Student> = students
            .get(index.as_str())
            .map_err(io_err)?
            .map(|bytes| decode(bytes.value()))
            .transpose()?;

        let Some(mut student) = current else {
            return Ok(false);
        };
        patch.apply_to(&mut student);

        let bytes = encode(&student)?;
        students
            .insert(index.as_str(), bytes.as_slice())
            .map_err(io_err)?;
        Ok(true)
    }

    fn reassign_enrollment(
        &mut self,
        index: &IndexNumber,
        enrollment_id: EnrollmentId,
    ) -> Result<bool, RegistrarError> {
        let mut students = self.txn.open_table(STUDENTS).map_err(io_err)?;
        let mut members = self
            .txn
            .open_multimap_table(ENROLLMENT_MEMBERS)
            .map_err(io_err)?;

        let current: Option<Student> = students
            .get(index.as_str())
            .map_err(io_err)?
            .map(|bytes| decode(bytes.value()))
            .transpose()?;
        let Some(mut student) = current else {
            return Ok(false);
        };

        members
            .remove(student.enrollment_id.0, index.as_str())
            .map_err(io_err)?;
        members
            .insert(enrollment_id.0, index.as_str())
            .map_err(io_err)?;

        student.enrollment_id = enrollment_id;
        let bytes = encode(&student)?;
        students
            .insert(index.as_str(), bytes.as_slice())
            .map_err(io_err)?;
        Ok(true)
    }

    fn reassign_all(
        &mut self,
        from: EnrollmentId,
        to: EnrollmentId,
    ) -> Result<usize, RegistrarError> {
        if from == to {
            let members = self
                .txn
                .open_multimap_table(ENROLLMENT_MEMBERS)
                .map_err(io_err)?;
            let mut count = 0usize;
            for member in members.get(from.0).map_err(io_err)? {
                member.map_err(io_err)?;
                count = count.saturating_add(1);
            }
            return Ok(count);
        }

        let mut students = self.txn.open_table(STUDENTS).map_err(io_err)?;
        let mut members = self
            .txn
            .open_multimap_table(ENROLLMENT_MEMBERS)
            .map_err(io_err)?;

        // Detach the whole membership list of the source in one call.
        let moved: Vec<String> = {
            let removed = members.remove_all(from.0).map_err(io_err)?;
            let mut indexes = Vec::new();
            for entry in removed {
                indexes.push(entry.map_err(io_err)?.value().to_string());
            }
            indexes
        };

        for index in &moved {
            let current: Option<Student> = students
                .get(index.as_str())
                .map_err(io_err)?
                .map(|bytes| decode(bytes.value()))
                .transpose()?;
            let mut student = current.ok_or_else(|| {
                RegistrarError::DanglingReference(format!(
                    "enrollment {} lists missing student {}",
                    from.0, index
                ))
            })?;
            student.enrollment_id = to;

            let bytes = encode(&student)?;
            students
                .insert(index.as_str(), bytes.as_slice())
                .map_err(io_err)?;
            members.insert(to.0, index.as_str()).map_err(io_err)?;
        }

        Ok(moved.len())
    }

    fn delete_student(&mut self, index: &IndexNumber) -> Result<bool, RegistrarError> {
        let mut students = self.txn.open_table(STUDENTS).map_err(io_err)?;
        let mut members = self
            .txn
            .open_multimap_table(ENROLLMENT_MEMBERS)
            .map_err(io_err)?;

        let removed: Option<Student> = students
            .remove(index.as_str())
            .map_err(io_err)?
            .map(|bytes| decode(bytes.value()))
            .transpose()?;

        match removed {
            Some(student) => {
                members
                    .remove(student.enrollment_id.0, index.as_str())
                    .map_err(io_err)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, Utc};
    use tempfile::tempdir;

    fn enrollment(id: u64, study: u64, semester: u32) -> Enrollment {
        Enrollment {
            id: EnrollmentId(id),
            study_id: StudyId(study),
            semester: Semester::new(semester),
            start_date: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn student(index: &str, enrollment: u64) -> Student {
        Student {
            index_number: IndexNumber::new(index),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2001, 5, 17).expect("date"),
            enrollment_id: EnrollmentId(enrollment),
        }
    }

    fn seeded(store: &RedbStore) {
        let mut txn = store.begin().expect("begin");
        txn.insert_study(&Study::new(StudyId(1), "CS"))
            .expect("study");
        txn.insert_enrollment(&enrollment(1, 1, 1))
            .expect("enrollment");
        txn.commit().expect("commit");
    }

    #[test]
    fn open_creates_empty_store() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let snapshot = store.read().expect("read");
        assert!(snapshot.all_students().expect("all").is_empty());
        assert!(snapshot.list_studies().expect("studies").is_empty());
        assert!(snapshot.list_enrollments().expect("enrollments").is_empty());
    }

    #[test]
    fn student_round_trip_through_storage() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        txn.insert_student(&student("s1", 1)).expect("insert");
        txn.commit().expect("commit");

        let snapshot = store.read().expect("read");
        let found = snapshot
            .find_student(&IndexNumber::new("s1"))
            .expect("find")
            .expect("present");
        assert_eq!(found, student("s1", 1));

        let views = snapshot.list_students().expect("views");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].study, "CS");
        assert_eq!(views[0].semester, 1);
    }

    #[test]
    fn aborted_transaction_leaves_no_trace() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        {
            let mut txn = store.begin().expect("begin");
            txn.insert_student(&student("s1", 1)).expect("insert");
            txn.insert_enrollment(&enrollment(2, 1, 2)).expect("insert");
            // dropped without commit
        }

        let snapshot = store.read().expect("read");
        assert!(snapshot.all_students().expect("all").is_empty());
        assert_eq!(snapshot.list_enrollments().expect("list").len(), 1);
    }

    #[test]
    fn duplicate_student_is_constraint_violation() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        txn.insert_student(&student("s1", 1)).expect("insert");
        let err = txn
            .insert_student(&student("s1", 1))
            .expect_err("duplicate");
        assert!(matches!(err, RegistrarError::ConstraintViolation(_)));
    }

    #[test]
    fn duplicate_enrollment_pair_is_constraint_violation() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        let err = txn
            .insert_enrollment(&enrollment(9, 1, 1))
            .expect_err("duplicate pair");
        assert!(matches!(err, RegistrarError::ConstraintViolation(_)));
    }

    #[test]
    fn next_enrollment_id_follows_max() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let mut txn = store.begin().expect("begin");
        assert_eq!(txn.next_enrollment_id().expect("next"), EnrollmentId(1));
        txn.insert_enrollment(&enrollment(4, 1, 1)).expect("insert");
        txn.insert_enrollment(&enrollment(2, 1, 2)).expect("insert");
        assert_eq!(txn.next_enrollment_id().expect("next"), EnrollmentId(5));
    }

    #[test]
    fn reassign_all_updates_records_and_membership() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        txn.insert_enrollment(&enrollment(2, 1, 2)).expect("insert");
        txn.insert_student(&student("a", 1)).expect("insert");
        txn.insert_student(&student("b", 1)).expect("insert");
        let moved = txn
            .reassign_all(EnrollmentId(1), EnrollmentId(2))
            .expect("reassign");
        txn.commit().expect("commit");
        assert_eq!(moved, 2);

        let snapshot = store.read().expect("read");
        assert!(snapshot
            .students_in_enrollment(EnrollmentId(1))
            .expect("old")
            .is_empty());
        let moved_students = snapshot
            .students_in_enrollment(EnrollmentId(2))
            .expect("new");
        assert_eq!(moved_students.len(), 2);
        assert!(moved_students
            .iter()
            .all(|s| s.enrollment_id == EnrollmentId(2)));
    }

    #[test]
    fn reassign_all_onto_itself_counts_members() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        txn.insert_student(&student("a", 1)).expect("insert");
        txn.insert_student(&student("b", 1)).expect("insert");
        let moved = txn
            .reassign_all(EnrollmentId(1), EnrollmentId(1))
            .expect("reassign");
        assert_eq!(moved, 2);
        assert_eq!(
            txn.students_in_enrollment(EnrollmentId(1))
                .expect("members")
                .len(),
            2
        );
    }

    #[test]
    fn reassign_single_student() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        txn.insert_enrollment(&enrollment(2, 1, 2)).expect("insert");
        txn.insert_student(&student("a", 1)).expect("insert");
        assert!(txn
            .reassign_enrollment(&IndexNumber::new("a"), EnrollmentId(2))
            .expect("reassign"));
        assert!(!txn
            .reassign_enrollment(&IndexNumber::new("ghost"), EnrollmentId(2))
            .expect("reassign"));

        let students = txn.students_in_enrollment(EnrollmentId(2)).expect("list");
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].enrollment_id, EnrollmentId(2));
    }

    #[test]
    fn delete_removes_membership() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        seeded(&store);

        let mut txn = store.begin().expect("begin");
        txn.insert_student(&student("a", 1)).expect("insert");
        assert!(txn.delete_student(&IndexNumber::new("a")).expect("delete"));
        assert!(!txn.delete_student(&IndexNumber::new("a")).expect("delete"));
        assert!(txn
            .students_in_enrollment(EnrollmentId(1))
            .expect("list")
            .is_empty());
    }

    #[test]
    fn data_persists_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            seeded(&store);
            let mut txn = store.begin().expect("begin");
            txn.insert_student(&student("s9", 1)).expect("insert");
            txn.commit().expect("commit");
        }

        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            let snapshot = store.read().expect("read");
            assert!(snapshot
                .find_student(&IndexNumber::new("s9"))
                .expect("find")
                .is_some());
            assert!(snapshot
                .find_study_by_name("CS")
                .expect("find")
                .is_some());
        }
    }
}
