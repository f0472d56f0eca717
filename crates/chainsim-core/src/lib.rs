//! # chainsim-core
//!
//! Core abstractions shared by the chainsim crates.
//!
//! - **Identifiers**: Strongly-typed IDs for scenarios and simulation jobs
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use chainsim_core::prelude::*;
//!
//! let scenario = ScenarioId::generate();
//! let job = JobId::generate();
//! assert_ne!(scenario.to_string(), job.to_string());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{JobId, ScenarioId};
    pub use crate::observability::{LogFormat, init_logging};
}

pub use error::{Error, Result};
pub use id::{JobId, ScenarioId};
pub use observability::{LogFormat, init_logging, simulation_span};
