//! sqlgate - SQL safety gateway for untrusted, LLM-generated queries.
//!
//! This crate accepts a candidate SQL statement produced on behalf of an
//! authenticated user and either rejects it or returns a rewritten,
//! provably-safe equivalent: read-only, restricted to whitelisted tables and
//! columns, free of blocklisted functions, scoped to the calling user's rows
//! on user-scoped tables, and bounded in result size.
//!
//! # Quick Start
//!
//! ```no_run
//! use sqlgate::prelude::*;
//!
//! let manifest = Manifest::from_file("manifest.json").unwrap();
//! let gateway = Gateway::new(manifest).unwrap();
//!
//! let safe_sql = gateway
//!     .validate_query("SELECT e.first_name FROM employee AS e", 456)
//!     .unwrap();
//! println!("{safe_sql}");
//! ```
//!
//! # Modules
//!
//! - [`gateway`] - The validation pipeline and its entry point
//! - [`manifest`] - Table policies and gateway configuration
//! - [`error`] - The error taxonomy surfaced to callers
//! - [`prelude`] - Convenient re-exports for common usage

pub mod ast;
pub mod cli;
pub mod error;
pub mod gateway;
pub mod manifest;
pub mod prelude;
