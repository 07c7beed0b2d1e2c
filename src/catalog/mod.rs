//! Governed catalog: data model, consistency engine and maintenance passes.

pub mod engine;
pub mod governance;
pub mod groom;
pub mod model;
pub mod query;
pub mod usage;
