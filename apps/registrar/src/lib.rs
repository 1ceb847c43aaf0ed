//! # registrar
//!
//! HTTP server, CLI and configuration around `registrar-core`.

pub mod api;
pub mod cli;
pub mod config;
