//! Identity service core library.
//!
//! Signing key lifecycle with encrypted storage and rotation, JWK
//! publication, token claim enrichment, and the privilege/role/user graph
//! with default propagation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod observability;
pub mod rbac;
pub mod scheduler;
pub mod shutdown;
pub mod time;
pub mod tokens;

// Re-exports for convenience
pub use app::IdentityCore;
pub use config::Config;
pub use error::{IdentityError, IdentityResult};
