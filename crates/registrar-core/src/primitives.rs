//! # Primitives
//!
//! Hardcoded runtime constants for the Registrar CORE.

use crate::types::{EnrollmentId, Semester, StudyId};

/// Semester every newly enrolled student starts in.
pub const FIRST_SEMESTER: Semester = Semester::new(1);

/// Id handed out for the first enrollment of an empty store.
///
/// Later ids are `max(existing) + 1`.
pub const FIRST_ENROLLMENT_ID: EnrollmentId = EnrollmentId(1);

/// Id handed out for the first study of an empty store.
pub const FIRST_STUDY_ID: StudyId = StudyId(1);

/// Marker returned by the request layer when a listing is empty.
pub const NO_RECORD_MARKER: &str = "No record!";
