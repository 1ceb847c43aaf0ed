//! # Registry
//!
//! The operation facade the request layer talks to.
//!
//! Every write operation runs inside one store transaction: the component
//! works against `&mut dyn Repository`, the transaction is committed when
//! it returns `Ok` and dropped (rolled back) when it returns `Err`. Read
//! operations run against a snapshot.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore` (volatile)
//! - `Persistent`: `RedbStore` (disk-backed, ACID)

use crate::lifecycle::StudentLifecycle;
use crate::promotion::{PromotionEngine, TargetEnrollmentPolicy};
use crate::repository::{Repository, RepositoryRead};
use crate::storage::{MemoryStore, RedbStore};
use crate::{
    EnrollRequest, Enrollment, EnrollmentSummary, IndexNumber, PromotionRequest,
    PromotionSummary, RegistrarError, StudentPatch, StudentView, Study,
};
use chrono::Utc;
use std::path::Path;

/// Storage backend of a [`Registry`].
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile in-memory tables.
    InMemory(MemoryStore),
    /// Disk-backed tables using redb.
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// Record counts, reported by the status endpoint and CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub studies: usize,
    pub enrollments: usize,
    pub students: usize,
}

/// A Registry binds a storage backend to the enrollment components.
#[derive(Debug, Default)]
pub struct Registry {
    backend: StorageBackend,
    policy: TargetEnrollmentPolicy,
}

impl Registry {
    /// Create a registry with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with persistent redb storage at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, RegistrarError> {
        let store = RedbStore::open(path)?;
        Ok(Self::with_backend(StorageBackend::Persistent(store)))
    }

    /// Create a registry over an existing backend.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            policy: TargetEnrollmentPolicy::default(),
        }
    }

    /// Replace the target enrollment policy used by `promote`.
    #[must_use]
    pub fn with_policy(mut self, policy: TargetEnrollmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> TargetEnrollmentPolicy {
        self.policy
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    // =========================================================================
    // TRANSACTION BOUNDARY
    // =========================================================================

    /// Run `f` inside one write transaction.
    ///
    /// Commits when `f` returns `Ok`; any error drops the transaction and
    /// leaves the store unchanged.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn Repository) -> Result<T, RegistrarError>,
    ) -> Result<T, RegistrarError> {
        match &self.backend {
            StorageBackend::InMemory(store) => {
                let mut txn = store.begin()?;
                let out = f(&mut txn)?;
                txn.commit()?;
                Ok(out)
            }
            StorageBackend::Persistent(store) => {
                let mut txn = store.begin()?;
                let out = f(&mut txn)?;
                txn.commit()?;
                Ok(out)
            }
        }
    }

    /// Run `f` against a read snapshot.
    pub fn with_snapshot<T>(
        &self,
        f: impl FnOnce(&dyn RepositoryRead) -> Result<T, RegistrarError>,
    ) -> Result<T, RegistrarError> {
        match &self.backend {
            StorageBackend::InMemory(store) => f(&store.read()?),
            StorageBackend::Persistent(store) => f(&store.read()?),
        }
    }

    // =========================================================================
    // STUDENT OPERATIONS
    // =========================================================================

    /// Enroll a new student into semester 1 of an existing study.
    pub fn enroll(&self, request: &EnrollRequest) -> Result<EnrollmentSummary, RegistrarError> {
        let now = Utc::now();
        self.in_transaction(|repo| StudentLifecycle::enroll(repo, request, now))
    }

    /// Apply a partial update to a student's names.
    pub fn update_student(
        &self,
        index: &IndexNumber,
        patch: &StudentPatch,
    ) -> Result<StudentView, RegistrarError> {
        self.in_transaction(|repo| StudentLifecycle::update(repo, index, patch))
    }

    /// Delete a student.
    pub fn delete_student(&self, index: &IndexNumber) -> Result<(), RegistrarError> {
        self.in_transaction(|repo| StudentLifecycle::delete(repo, index))
    }

    /// One student's projection, or `None`.
    pub fn get_student(&self, index: &IndexNumber) -> Result<Option<StudentView>, RegistrarError> {
        self.with_snapshot(|repo| StudentLifecycle::get_one(repo, index))
    }

    /// Every student's projection, ordered by index number.
    pub fn list_students(&self) -> Result<Vec<StudentView>, RegistrarError> {
        self.with_snapshot(|repo| StudentLifecycle::get_all(repo))
    }

    /// Move every student of one semester to another.
    pub fn promote(
        &self,
        request: &PromotionRequest,
    ) -> Result<Vec<PromotionSummary>, RegistrarError> {
        let now = Utc::now();
        let policy = self.policy;
        self.in_transaction(|repo| PromotionEngine::promote(repo, request, policy, now))
    }

    // =========================================================================
    // STUDY OPERATIONS
    // =========================================================================

    /// Register a new study program.
    ///
    /// # Errors
    /// - `EmptyParameter` if the name is blank
    /// - `BadRequest` if a study with that name already exists
    pub fn add_study(&self, name: &str) -> Result<Study, RegistrarError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistrarError::EmptyParameter(
                "study name is required".to_string(),
            ));
        }
        self.in_transaction(|repo| {
            if repo.find_study_by_name(name)?.is_some() {
                return Err(RegistrarError::BadRequest(format!(
                    "study {} already exists",
                    name
                )));
            }
            let study = Study::new(repo.next_study_id()?, name);
            repo.insert_study(&study)?;
            Ok(study)
        })
    }

    /// Every study, ordered by id.
    pub fn list_studies(&self) -> Result<Vec<Study>, RegistrarError> {
        self.with_snapshot(|repo| repo.list_studies())
    }

    /// Every enrollment, ordered by id.
    pub fn list_enrollments(&self) -> Result<Vec<Enrollment>, RegistrarError> {
        self.with_snapshot(|repo| repo.list_enrollments())
    }

    /// Record counts of the committed state.
    pub fn stats(&self) -> Result<RegistryStats, RegistrarError> {
        self.with_snapshot(|repo| {
            Ok(RegistryStats {
                studies: repo.list_studies()?.len(),
                enrollments: repo.list_enrollments()?.len(),
                students: repo.all_students()?.len(),
            })
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
