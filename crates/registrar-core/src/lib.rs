//! # registrar-core
//!
//! The enrollment engine for Registrar - THE LOGIC.
//!
//! This crate keeps the `Student -> Enrollment -> Study` references of a
//! student registry coherent: students are enrolled into the first semester
//! of an existing study, edited, deleted, and promoted in bulk from one
//! semester to another.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Owns every rule about enrollment ids and references
//! - Runs each multi-step operation in exactly one store transaction
//! - Uses BTreeMap ordering only, so listings are deterministic
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod lifecycle;
pub mod primitives;
pub mod promotion;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EnrollRequest, Enrollment, EnrollmentId, EnrollmentSummary, ErrorKind, IndexNumber,
    PromotionRequest, PromotionSummary, RegistrarError, Semester, Student, StudentPatch,
    StudentView, Study, StudyId,
};

// =============================================================================
// RE-EXPORTS: Enrollment Engine
// =============================================================================

pub use lifecycle::StudentLifecycle;
pub use primitives::{FIRST_SEMESTER, NO_RECORD_MARKER};
pub use promotion::{PromotionEngine, TargetEnrollmentPolicy};
pub use registry::{Registry, RegistryStats, StorageBackend};
pub use repository::{Repository, RepositoryRead};
pub use resolver::{EnrollmentResolver, Resolution};
pub use storage::{MemoryStore, RedbStore};
