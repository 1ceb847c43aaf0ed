//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Registry operations are synchronous and may wait on the store's writer
//! lock, so every call runs on the blocking pool.

use super::{
    AppState,
    types::{
        DeleteResponse, EnrollBody, ErrorResponse, HealthResponse, PromoteBody, StatusResponse,
        StudentListResponse, StudyBody, StudyJson, UpdateBody,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use registrar_core::{
    EnrollmentSummary, ErrorKind, IndexNumber, PromotionSummary, RegistrarError, Registry,
    StudentPatch, StudentView,
};
use std::sync::Arc;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for each error kind.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::EmptyParameter | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A core error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub RegistrarError);

impl From<RegistrarError> for ApiError {
    fn from(e: RegistrarError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.is_recoverable() {
            tracing::warn!(kind = err.kind().as_str(), "Request rejected: {}", err);
        } else {
            tracing::error!("Registry failure: {}", err);
        }
        (status_for(err.kind()), Json(ErrorResponse::from_error(&err))).into_response()
    }
}

/// Run a registry operation on the blocking pool.
async fn run<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Registry) -> Result<T, RegistrarError> + Send + 'static,
{
    let registry = Arc::clone(&state.registry);
    tokio::task::spawn_blocking(move || op(&registry))
        .await
        .map_err(|e| RegistrarError::IoError(format!("Registry task failed: {}", e)))?
        .map_err(ApiError)
}

// =============================================================================
// HEALTH & STATUS HANDLERS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Record counts and storage mode.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let (stats, persistent, policy) = run(&state, |registry| {
        Ok((
            registry.stats()?,
            registry.is_persistent(),
            registry.policy(),
        ))
    })
    .await?;

    Ok(Json(StatusResponse {
        studies: stats.studies,
        enrollments: stats.enrollments,
        students: stats.students,
        persistent,
        target_policy: policy.to_string(),
    }))
}

// =============================================================================
// STUDENT HANDLERS
// =============================================================================

/// List every student.
pub async fn list_students_handler(
    State(state): State<AppState>,
) -> Result<Json<StudentListResponse>, ApiError> {
    let students = run(&state, |registry| registry.list_students()).await?;
    Ok(Json(StudentListResponse::new(students)))
}

/// Get one student by index number.
pub async fn get_student_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> Result<Json<StudentView>, ApiError> {
    let index = IndexNumber::new(index);
    let lookup = index.clone();
    match run(&state, move |registry| registry.get_student(&lookup)).await? {
        Some(view) => Ok(Json(view)),
        None => Err(ApiError(RegistrarError::NotFound(format!(
            "student {} does not exist",
            index
        )))),
    }
}

/// Enroll a new student into semester 1.
pub async fn enroll_handler(
    State(state): State<AppState>,
    Json(body): Json<EnrollBody>,
) -> Result<Json<EnrollmentSummary>, ApiError> {
    let request = body.to_request()?;
    let index = request.index_number.clone();
    let summary = run(&state, move |registry| registry.enroll(&request)).await?;
    tracing::info!("Enrolled {} into {} semester {}", index, summary.study, summary.semester);
    Ok(Json(summary))
}

/// Update a student's names.
pub async fn update_student_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<StudentView>, ApiError> {
    let index = IndexNumber::new(index);
    let patch: StudentPatch = body.into();
    let view = run(&state, move |registry| registry.update_student(&index, &patch)).await?;
    tracing::info!("Updated student {}", view.index_number);
    Ok(Json(view))
}

/// Delete a student.
pub async fn delete_student_handler(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let target = IndexNumber::new(index.as_str());
    run(&state, move |registry| registry.delete_student(&target)).await?;
    tracing::info!("Deleted student {}", index);
    Ok(Json(DeleteResponse::new(&index)))
}

// =============================================================================
// PROMOTION HANDLER
// =============================================================================

/// Move every student of one semester to another.
pub async fn promote_handler(
    State(state): State<AppState>,
    Json(body): Json<PromoteBody>,
) -> Result<Json<Vec<PromotionSummary>>, ApiError> {
    let request = body.to_request();
    let summaries = run(&state, move |registry| registry.promote(&request)).await?;
    tracing::info!("Promoted {} students", summaries.len());
    Ok(Json(summaries))
}

// =============================================================================
// STUDY HANDLERS
// =============================================================================

/// List every study.
pub async fn list_studies_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudyJson>>, ApiError> {
    let studies = run(&state, |registry| registry.list_studies()).await?;
    Ok(Json(studies.iter().map(StudyJson::from).collect()))
}

/// Register a new study.
pub async fn add_study_handler(
    State(state): State<AppState>,
    Json(body): Json<StudyBody>,
) -> Result<(StatusCode, Json<StudyJson>), ApiError> {
    let study = run(&state, move |registry| registry.add_study(&body.name)).await?;
    tracing::info!("Added study {} ({})", study.name, study.id.0);
    Ok((StatusCode::CREATED, Json(StudyJson::from(&study))))
}
