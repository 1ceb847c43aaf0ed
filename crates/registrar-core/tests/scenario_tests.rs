//! # Scenario Tests
//!
//! End-to-end behavior of the Registry facade on both backends, plus the
//! concurrent enrollment allocation stress test.

use chrono::{NaiveDate, Utc};
use registrar_core::{
    EnrollRequest, EnrollmentResolver, IndexNumber, PromotionRequest, Registry, RegistrarError,
    Semester, StudentPatch,
};
use std::collections::BTreeSet;
use tempfile::tempdir;

fn enroll_request(index: &str, study: &str) -> EnrollRequest {
    EnrollRequest {
        index_number: index.to_string(),
        first_name: "Barbara".to_string(),
        last_name: "Liskov".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1998, 11, 7),
        study_name: study.to_string(),
    }
}

fn promote(old: u32, new: u32) -> PromotionRequest {
    PromotionRequest {
        study_name: "CS".to_string(),
        old_semester: Semester::new(old),
        new_semester: Semester::new(new),
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn enroll_then_promote_single_student() {
        let registry = Registry::new();
        registry.add_study("CS").expect("study");

        let summary = registry.enroll(&enroll_request("A1", "CS")).expect("enroll");
        assert_eq!(summary.semester, 1);
        assert_eq!(summary.study, "CS");

        let promoted = registry.promote(&promote(1, 2)).expect("promote");
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].first_name, "Barbara");
        assert_eq!(promoted[0].last_name, "Liskov");
        assert_eq!(promoted[0].study, "CS");
        assert_eq!(promoted[0].old_semester, 1);
        assert_eq!(promoted[0].new_semester, 2);

        let view = registry
            .get_student(&IndexNumber::new("A1"))
            .expect("get")
            .expect("present");
        assert_eq!(view.semester, 2);
    }

    #[test]
    fn duplicate_enroll_leaves_one_student() {
        let registry = Registry::new();
        registry.add_study("CS").expect("study");
        registry.enroll(&enroll_request("A1", "CS")).expect("enroll");

        let err = registry
            .enroll(&enroll_request("A1", "CS"))
            .expect_err("duplicate");
        assert!(matches!(err, RegistrarError::BadRequest(_)));
        assert_eq!(registry.list_students().expect("list").len(), 1);
    }

    #[test]
    fn unknown_study_creates_nothing() {
        let registry = Registry::new();
        registry.add_study("CS").expect("study");

        let err = registry
            .enroll(&enroll_request("A1", "Physics"))
            .expect_err("unknown study");
        assert!(matches!(err, RegistrarError::NotFound(_)));
        let stats = registry.stats().expect("stats");
        assert_eq!(stats.students, 0);
        assert_eq!(stats.enrollments, 0);
    }

    #[test]
    fn update_then_delete() {
        let registry = Registry::new();
        registry.add_study("CS").expect("study");
        registry.enroll(&enroll_request("A1", "CS")).expect("enroll");

        let view = registry
            .update_student(
                &IndexNumber::new("A1"),
                &StudentPatch {
                    first_name: Some("Barb".to_string()),
                    last_name: None,
                },
            )
            .expect("update");
        assert_eq!(view.first_name, "Barb");
        assert_eq!(view.last_name, "Liskov");

        registry
            .delete_student(&IndexNumber::new("A1"))
            .expect("delete");
        assert!(
            registry
                .get_student(&IndexNumber::new("A1"))
                .expect("get")
                .is_none()
        );
        assert!(matches!(
            registry.delete_student(&IndexNumber::new("A1")),
            Err(RegistrarError::NotFound(_))
        ));
    }

    #[test]
    fn promotion_keeps_other_studies_untouched() {
        let registry = Registry::new();
        registry.add_study("CS").expect("cs");
        registry.add_study("Math").expect("math");
        registry.enroll(&enroll_request("c1", "CS")).expect("c1");
        registry.enroll(&enroll_request("m1", "Math")).expect("m1");

        registry.promote(&promote(1, 3)).expect("promote");

        let math = registry
            .get_student(&IndexNumber::new("m1"))
            .expect("get")
            .expect("present");
        assert_eq!(math.semester, 1);
        assert_eq!(math.study, "Math");
    }

    #[test]
    fn failed_promotion_changes_nothing_on_disk() {
        let dir = tempdir().expect("tempdir");
        let registry = Registry::with_redb(dir.path().join("registry.redb")).expect("open");
        registry.add_study("CS").expect("study");
        registry.enroll(&enroll_request("A1", "CS")).expect("enroll");

        let err = registry.promote(&promote(4, 5)).expect_err("no semester 4");
        assert!(matches!(err, RegistrarError::NotFound(_)));
        assert_eq!(registry.list_enrollments().expect("list").len(), 1);
    }

    fn promote_to_same_semester(registry: &Registry) {
        registry.add_study("CS").expect("study");
        registry.enroll(&enroll_request("A1", "CS")).expect("a1");
        registry.enroll(&enroll_request("B2", "CS")).expect("b2");

        let summaries = registry.promote(&promote(1, 1)).expect("promote");

        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.old_semester == 1 && s.new_semester == 1));
        assert_eq!(registry.list_enrollments().expect("list").len(), 1);
        assert!(registry
            .list_students()
            .expect("list")
            .iter()
            .all(|s| s.semester == 1));
    }

    #[test]
    fn in_memory_promote_to_same_semester() {
        promote_to_same_semester(&Registry::new());
    }

    #[test]
    fn redb_promote_to_same_semester() {
        let dir = tempdir().expect("tempdir");
        let registry = Registry::with_redb(dir.path().join("same.redb")).expect("open");
        promote_to_same_semester(&registry);
    }

    #[test]
    fn study_names_are_trimmed_everywhere() {
        let registry = Registry::new();
        registry.add_study(" CS ").expect("study");

        let summary = registry
            .enroll(&enroll_request("A1", "CS "))
            .expect("enroll");
        assert_eq!(summary.study, "CS");

        let mut request = promote(1, 2);
        request.study_name = "  CS".to_string();
        assert_eq!(registry.promote(&request).expect("promote").len(), 1);
    }
}

// =============================================================================
// CONCURRENT ALLOCATION
// =============================================================================

mod concurrency {
    use super::*;

    const THREADS: usize = 8;
    const ROUNDS: u32 = 10;

    /// Many writers resolving the same `(study, semester)` pairs must end up
    /// with exactly one enrollment per pair and dense ids.
    fn stress(registry: &Registry) {
        registry.add_study("CS").expect("study");

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for semester in 1..=ROUNDS {
                        registry
                            .in_transaction(|repo| {
                                EnrollmentResolver::resolve_or_create(
                                    repo,
                                    "CS",
                                    Semester::new(semester),
                                    Utc::now(),
                                )
                            })
                            .expect("resolve");
                    }
                });
            }
        });

        let enrollments = registry.list_enrollments().expect("list");
        assert_eq!(enrollments.len(), ROUNDS as usize);
        let semesters: BTreeSet<u32> = enrollments.iter().map(|e| e.semester.value()).collect();
        assert_eq!(semesters.len(), ROUNDS as usize);
        let ids: BTreeSet<u64> = enrollments.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, (1..=u64::from(ROUNDS)).collect());
    }

    #[test]
    fn in_memory_resolve_never_duplicates() {
        stress(&Registry::new());
    }

    #[test]
    fn redb_resolve_never_duplicates() {
        let dir = tempdir().expect("tempdir");
        let registry = Registry::with_redb(dir.path().join("stress.redb")).expect("open");
        stress(&registry);
    }

    #[test]
    fn concurrent_enrolls_share_first_semester() {
        let registry = Registry::new();
        registry.add_study("CS").expect("study");

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let registry = &registry;
                scope.spawn(move || {
                    registry
                        .enroll(&enroll_request(&format!("s{}", t), "CS"))
                        .expect("enroll");
                });
            }
        });

        assert_eq!(registry.list_enrollments().expect("list").len(), 1);
        assert_eq!(registry.list_students().expect("list").len(), THREADS);
    }

    /// Many writers enrolling one index number: the duplicate check runs in
    /// the same serialized write as the insert, so exactly one wins.
    fn same_index_race(registry: &Registry) {
        registry.add_study("CS").expect("study");

        let results: Vec<Result<_, RegistrarError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| registry.enroll(&enroll_request("X", "CS"))))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("join"))
                .collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(RegistrarError::BadRequest(_))))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(rejected, THREADS - 1);
        assert_eq!(registry.list_students().expect("list").len(), 1);
        assert_eq!(registry.list_enrollments().expect("list").len(), 1);
    }

    #[test]
    fn in_memory_duplicate_enroll_race_has_one_winner() {
        same_index_race(&Registry::new());
    }

    #[test]
    fn redb_duplicate_enroll_race_has_one_winner() {
        let dir = tempdir().expect("tempdir");
        let registry = Registry::with_redb(dir.path().join("race.redb")).expect("open");
        same_index_race(&registry);
    }
}
