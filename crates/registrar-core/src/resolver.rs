//! # Enrollment Resolver
//!
//! Maps a `(study name, semester)` pair to its enrollment, allocating a new
//! enrollment when the pair has none yet.
//!
//! - Never returns an id without a stored enrollment behind it
//! - Never creates a second enrollment for the same pair

use crate::repository::{Repository, RepositoryRead};
use crate::{Enrollment, RegistrarError, Semester, Study};
use chrono::{DateTime, Utc};

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub study: Study,
    pub enrollment: Enrollment,
    /// True when the enrollment was allocated by this call.
    pub created: bool,
}

/// The EnrollmentResolver finds or allocates enrollments.
pub struct EnrollmentResolver;

impl EnrollmentResolver {
    /// Lookup a study by its trimmed name, failing with `NotFound` if it is
    /// unknown.
    pub fn study<R: RepositoryRead + ?Sized>(
        repo: &R,
        study_name: &str,
    ) -> Result<Study, RegistrarError> {
        let study_name = study_name.trim();
        repo.find_study_by_name(study_name)?
            .ok_or_else(|| RegistrarError::NotFound(format!("study {} does not exist", study_name)))
    }

    /// Find the existing enrollment of `(study, semester)` without allocating.
    ///
    /// Fails with `NotFound` if either the study or the semester is unknown.
    pub fn find_existing<R: RepositoryRead + ?Sized>(
        repo: &R,
        study_name: &str,
        semester: Semester,
    ) -> Result<Resolution, RegistrarError> {
        let study = Self::study(repo, study_name)?;
        let enrollment = repo.find_enrollment(study.id, semester)?.ok_or_else(|| {
            RegistrarError::NotFound(format!(
                "semester {} does not exist for study {}",
                semester, study.name
            ))
        })?;
        Ok(Resolution {
            study,
            enrollment,
            created: false,
        })
    }

    /// Resolve the enrollment of `(study, semester)`, creating it if absent.
    ///
    /// A new enrollment gets `next_enrollment_id()` (max + 1 over every
    /// enrollment) and `start_date = now`.
    pub fn resolve_or_create<R: Repository + ?Sized>(
        repo: &mut R,
        study_name: &str,
        semester: Semester,
        now: DateTime<Utc>,
    ) -> Result<Resolution, RegistrarError> {
        let study = Self::study(&*repo, study_name)?;

        if let Some(enrollment) = repo.find_enrollment(study.id, semester)? {
            return Ok(Resolution {
                study,
                enrollment,
                created: false,
            });
        }

        let enrollment = Enrollment {
            id: repo.next_enrollment_id()?,
            study_id: study.id,
            semester,
            start_date: now,
        };
        repo.insert_enrollment(&enrollment)?;

        Ok(Resolution {
            study,
            enrollment,
            created: true,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::{EnrollmentId, Study, StudyId};

    fn store_with_studies(names: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let mut txn = store.begin().expect("begin");
        for (i, name) in names.iter().enumerate() {
            txn.insert_study(&Study::new(StudyId(i as u64 + 1), *name))
                .expect("study");
        }
        txn.commit().expect("commit");
        store
    }

    #[test]
    fn unknown_study_is_not_found() {
        let store = store_with_studies(&["CS"]);
        let mut txn = store.begin().expect("begin");
        let err = EnrollmentResolver::resolve_or_create(
            &mut txn,
            "History",
            Semester::new(1),
            Utc::now(),
        )
        .expect_err("unknown study");
        assert!(matches!(err, RegistrarError::NotFound(_)));
        assert!(txn.list_enrollments().expect("list").is_empty());
    }

    #[test]
    fn creates_then_reuses() {
        let store = store_with_studies(&["CS"]);
        let mut txn = store.begin().expect("begin");
        let now = Utc::now();

        let first = EnrollmentResolver::resolve_or_create(&mut txn, "CS", Semester::new(1), now)
            .expect("first");
        assert!(first.created);
        assert_eq!(first.enrollment.id, EnrollmentId(1));
        assert_eq!(first.enrollment.start_date, now);

        let second = EnrollmentResolver::resolve_or_create(&mut txn, "CS", Semester::new(1), now)
            .expect("second");
        assert!(!second.created);
        assert_eq!(second.enrollment.id, first.enrollment.id);
        assert_eq!(txn.list_enrollments().expect("list").len(), 1);
    }

    #[test]
    fn ids_are_global_not_per_study() {
        let store = store_with_studies(&["CS", "Math"]);
        let mut txn = store.begin().expect("begin");
        let now = Utc::now();

        let cs = EnrollmentResolver::resolve_or_create(&mut txn, "CS", Semester::new(1), now)
            .expect("cs");
        let math = EnrollmentResolver::resolve_or_create(&mut txn, "Math", Semester::new(1), now)
            .expect("math");
        let cs2 = EnrollmentResolver::resolve_or_create(&mut txn, "CS", Semester::new(2), now)
            .expect("cs2");

        assert_eq!(cs.enrollment.id, EnrollmentId(1));
        assert_eq!(math.enrollment.id, EnrollmentId(2));
        assert_eq!(cs2.enrollment.id, EnrollmentId(3));
    }

    #[test]
    fn find_existing_does_not_allocate() {
        let store = store_with_studies(&["CS"]);
        let txn = store.begin().expect("begin");

        let err = EnrollmentResolver::find_existing(&txn, "CS", Semester::new(4))
            .expect_err("missing semester");
        assert!(matches!(err, RegistrarError::NotFound(_)));
        assert!(txn.list_enrollments().expect("list").is_empty());
    }

    #[test]
    fn study_lookup_ignores_surrounding_whitespace() {
        let store = store_with_studies(&["CS"]);
        let mut txn = store.begin().expect("begin");

        let found = EnrollmentResolver::resolve_or_create(
            &mut txn,
            " CS\t",
            Semester::new(1),
            Utc::now(),
        )
        .expect("resolve");
        assert_eq!(found.study.name, "CS");
        assert!(EnrollmentResolver::find_existing(&txn, "CS ", Semester::new(1)).is_ok());
    }
}
