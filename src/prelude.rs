//! Convenient re-exports for common sqlgate usage.
//!
//! # Example
//!
//! ```no_run
//! use sqlgate::prelude::*;
//!
//! let gateway = Gateway::new(Manifest::from_file("manifest.json").unwrap()).unwrap();
//! let sql = gateway.validate_query("SELECT e.id FROM employee AS e", 456).unwrap();
//! ```

pub use crate::error::{GatewayError, Result};
pub use crate::gateway::{Gateway, ValidateOptions};
pub use crate::manifest::{Manifest, Scope, TablePolicy};
