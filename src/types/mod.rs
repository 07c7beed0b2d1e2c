//! Core types for the curator server.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: filename-safe `EntryId`
//! - **Errors**: application error taxonomy with stable wire codes
//! - **Config**: configuration structures for server, catalog, and transport

mod config;
mod errors;
mod ids;

pub use config::{CatalogConfig, Config, IpcConfig, ServerConfig, ValidationBackend};
pub use errors::{Error, FieldViolation, Result};
pub use ids::EntryId;
