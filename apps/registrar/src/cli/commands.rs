//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, parse_date};
use crate::config::{BackendKind, RegistrarConfig};
use registrar_core::{
    EnrollRequest, IndexNumber, NO_RECORD_MARKER, PromotionRequest, RegistrarError, Registry,
    Semester, StudentPatch, StudentView,
};
use serde::Serialize;

/// Print a value as pretty JSON.
fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Open the registry for a one-shot command.
///
/// A memory registry would vanish when the command exits, so only the
/// server may run on it.
fn open_persistent(config: &RegistrarConfig) -> Result<Registry, RegistrarError> {
    if config.storage.backend == BackendKind::Memory {
        return Err(RegistrarError::BadRequest(
            "the memory backend only lives inside `registrar server`".to_string(),
        ));
    }
    config.open_registry()
}

fn print_student(view: &StudentView) {
    println!("Index:      {}", view.index_number);
    println!("Name:       {} {}", view.first_name, view.last_name);
    println!("Birth date: {}", view.birth_date);
    println!("Study:      {}", view.study);
    println!("Semester:   {}", view.semester);
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &RegistrarConfig) -> Result<(), RegistrarError> {
    let registry = config.open_registry()?;

    println!("Registrar Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", config.storage.backend.as_str());
    println!("  Database: {:?}", config.storage.path);
    println!("  Policy:   {}", config.promotion.target_policy);
    println!();
    println!("Endpoints:");
    println!("  GET/POST        /api/students         - List / enroll");
    println!("  GET/PUT/DELETE  /api/students/{{index}} - Show / update / delete");
    println!("  POST            /api/promotions       - Promote a semester");
    println!("  GET/POST        /api/studies          - List / add studies");
    println!("  GET             /status               - Record counts");
    println!("  GET             /health               - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(registry, &config.server).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record counts.
pub fn cmd_status(config: &RegistrarConfig, json_mode: bool) -> Result<(), RegistrarError> {
    let registry = open_persistent(config)?;
    let stats = registry.stats()?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "backend": config.storage.backend.as_str(),
            "studies": stats.studies,
            "enrollments": stats.enrollments,
            "students": stats.students,
            "target_policy": registry.policy().as_str(),
        }));
        return Ok(());
    }

    println!("Registrar Status");
    println!("================");
    println!("Database: {:?}", config.storage.path);
    println!("Backend:  {}", config.storage.backend.as_str());
    println!();
    println!("Studies:     {}", stats.studies);
    println!("Enrollments: {}", stats.enrollments);
    println!("Students:    {}", stats.students);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &RegistrarConfig, force: bool) -> Result<(), RegistrarError> {
    if config.storage.backend == BackendKind::Memory {
        return Err(RegistrarError::BadRequest(
            "the memory backend has nothing to initialize".to_string(),
        ));
    }

    let path = &config.storage.path;
    if path.exists() {
        if !force {
            return Err(RegistrarError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| RegistrarError::IoError(format!("Remove db: {}", e)))?;
    }

    config.open_registry()?;
    println!("Initialized new redb database at {:?}", path);
    Ok(())
}

// =============================================================================
// STUDY COMMANDS
// =============================================================================

/// Register a study program.
pub fn cmd_add_study(
    config: &RegistrarConfig,
    json_mode: bool,
    name: &str,
) -> Result<(), RegistrarError> {
    let study = open_persistent(config)?.add_study(name)?;
    if json_mode {
        print_json(&api::StudyJson::from(&study));
    } else {
        println!("Added study {} (id {})", study.name, study.id.0);
    }
    Ok(())
}

/// List study programs.
pub fn cmd_studies(config: &RegistrarConfig, json_mode: bool) -> Result<(), RegistrarError> {
    let studies = open_persistent(config)?.list_studies()?;
    if json_mode {
        let out: Vec<api::StudyJson> = studies.iter().map(api::StudyJson::from).collect();
        print_json(&out);
        return Ok(());
    }
    if studies.is_empty() {
        println!("{}", NO_RECORD_MARKER);
    }
    for study in &studies {
        println!("{:>4}  {}", study.id.0, study.name);
    }
    Ok(())
}

// =============================================================================
// STUDENT COMMANDS
// =============================================================================

/// List every student.
pub fn cmd_list(config: &RegistrarConfig, json_mode: bool) -> Result<(), RegistrarError> {
    let students = open_persistent(config)?.list_students()?;
    if json_mode {
        print_json(&api::StudentListResponse::new(students));
        return Ok(());
    }
    if students.is_empty() {
        println!("{}", NO_RECORD_MARKER);
    }
    for view in &students {
        println!(
            "{:<12} {:<16} {:<16} {:<20} {}",
            view.index_number, view.first_name, view.last_name, view.study, view.semester
        );
    }
    Ok(())
}

/// Show one student.
pub fn cmd_show(
    config: &RegistrarConfig,
    json_mode: bool,
    index: &str,
) -> Result<(), RegistrarError> {
    let view = open_persistent(config)?
        .get_student(&IndexNumber::new(index))?
        .ok_or_else(|| RegistrarError::NotFound(format!("student {} does not exist", index)))?;
    if json_mode {
        print_json(&view);
    } else {
        print_student(&view);
    }
    Ok(())
}

/// Positional arguments of `enroll`.
#[derive(Debug, Clone)]
pub struct EnrollArgs {
    pub index: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub study: String,
}

/// Enroll a student into semester 1.
pub fn cmd_enroll(
    config: &RegistrarConfig,
    json_mode: bool,
    args: &EnrollArgs,
) -> Result<(), RegistrarError> {
    let request = EnrollRequest {
        index_number: args.index.clone(),
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        birth_date: Some(parse_date(args.birth_date.trim())?),
        study_name: args.study.clone(),
    };
    let summary = open_persistent(config)?.enroll(&request)?;
    if json_mode {
        print_json(&summary);
    } else {
        println!(
            "Enrolled {} {} into {} semester {}",
            summary.first_name, summary.last_name, summary.study, summary.semester
        );
    }
    Ok(())
}

/// Update a student's names.
pub fn cmd_update(
    config: &RegistrarConfig,
    json_mode: bool,
    index: &str,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<(), RegistrarError> {
    let patch = StudentPatch {
        first_name,
        last_name,
    };
    let view = open_persistent(config)?.update_student(&IndexNumber::new(index), &patch)?;
    if json_mode {
        print_json(&view);
    } else {
        print_student(&view);
    }
    Ok(())
}

/// Delete a student.
pub fn cmd_delete(
    config: &RegistrarConfig,
    json_mode: bool,
    index: &str,
) -> Result<(), RegistrarError> {
    open_persistent(config)?.delete_student(&IndexNumber::new(index))?;
    if json_mode {
        print_json(&api::DeleteResponse::new(index));
    } else {
        println!("Deleted student {}", index);
    }
    Ok(())
}

// =============================================================================
// PROMOTE COMMAND
// =============================================================================

/// Move every student of one semester to another.
pub fn cmd_promote(
    config: &RegistrarConfig,
    json_mode: bool,
    study: &str,
    old_semester: u32,
    new_semester: u32,
) -> Result<(), RegistrarError> {
    let request = PromotionRequest {
        study_name: study.to_string(),
        old_semester: Semester::new(old_semester),
        new_semester: Semester::new(new_semester),
    };
    let summaries = open_persistent(config)?.promote(&request)?;

    if json_mode {
        print_json(&summaries);
        return Ok(());
    }

    println!(
        "Promoted {} students of {} from semester {} to {}",
        summaries.len(),
        study,
        old_semester,
        new_semester
    );
    for s in &summaries {
        println!("  {} {}", s.first_name, s.last_name);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn redb_config(dir: &tempfile::TempDir) -> RegistrarConfig {
        let mut config = RegistrarConfig::default();
        config.storage.path = dir.path().join("cli.redb");
        config
    }

    #[test]
    fn commands_share_one_database() {
        let dir = tempdir().expect("tempdir");
        let config = redb_config(&dir);

        cmd_init(&config, false).expect("init");
        cmd_add_study(&config, true, "CS").expect("study");
        cmd_enroll(
            &config,
            true,
            &EnrollArgs {
                index: "A1".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                birth_date: "1999-12-10".to_string(),
                study: "CS".to_string(),
            },
        )
        .expect("enroll");
        cmd_promote(&config, true, "CS", 1, 2).expect("promote");

        let view = config
            .open_registry()
            .expect("open")
            .get_student(&IndexNumber::new("A1"))
            .expect("get")
            .expect("present");
        assert_eq!(view.semester, 2);
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = tempdir().expect("tempdir");
        let config = redb_config(&dir);
        cmd_init(&config, false).expect("init");
        assert!(cmd_init(&config, false).is_err());
        cmd_init(&config, true).expect("forced init");
    }

    #[test]
    fn enroll_with_malformed_date_is_bad_request() {
        let dir = tempdir().expect("tempdir");
        let config = redb_config(&dir);
        let err = cmd_enroll(
            &config,
            true,
            &EnrollArgs {
                index: "A1".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                birth_date: "10/12/1999".to_string(),
                study: "CS".to_string(),
            },
        )
        .expect_err("bad date");
        assert!(matches!(err, RegistrarError::BadRequest(_)));
    }

    #[test]
    fn data_commands_refuse_memory_backend() {
        let mut config = RegistrarConfig::default();
        config.storage.backend = BackendKind::Memory;

        assert!(matches!(
            cmd_list(&config, true),
            Err(RegistrarError::BadRequest(_))
        ));
        assert!(matches!(
            cmd_add_study(&config, true, "CS"),
            Err(RegistrarError::BadRequest(_))
        ));
        assert!(matches!(
            cmd_status(&config, true),
            Err(RegistrarError::BadRequest(_))
        ));
    }

    #[test]
    fn show_missing_student_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let config = redb_config(&dir);
        let err = cmd_show(&config, true, "ghost").expect_err("missing");
        assert!(matches!(err, RegistrarError::NotFound(_)));
    }
}
