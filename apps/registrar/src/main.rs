//! # Registrar - Student Enrollment Server
//!
//! The main binary for the Registrar enrollment engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for registry operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │            apps/registrar (THE BINARY)           │
//! │                                                  │
//! │   ┌─────────────┐          ┌─────────────┐       │
//! │   │    CLI      │          │  HTTP API   │       │
//! │   │   (clap)    │          │   (axum)    │       │
//! │   └──────┬──────┘          └──────┬──────┘       │
//! │          └───────────┬────────────┘              │
//! │                      ▼                           │
//! │             ┌─────────────────┐                  │
//! │             │ registrar-core  │                  │
//! │             │  (THE LOGIC)    │                  │
//! │             └─────────────────┘                  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! registrar server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! registrar add-study "Computer Science"
//! registrar enroll s1234 Ada Lovelace 1999-12-10 "Computer Science"
//! registrar promote "Computer Science" 1 2
//! ```

use clap::Parser;
use registrar::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // REGISTRAR_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("REGISTRAR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "registrar=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Registrar startup banner.
fn print_banner() {
    println!(
        r#"
  Registrar v{}
  Enrollment • Promotion • Consistency
"#,
        env!("CARGO_PKG_VERSION")
    );
}
