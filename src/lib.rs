//! curator-core: a governed-catalog server over a framed duplex stream.
//!
//! The crate has two halves. The catalog half ([`catalog`], [`store`],
//! [`hash`]) keeps a content-addressed entry store consistent: every entry
//! carries a digest of its semantic content, mutations go through a
//! persist-then-verify pipeline, and clients synchronize via hash diffs
//! instead of full dumps. The wire half ([`ipc`], [`registry`],
//! [`validation`]) exposes it over length-prefixed JSON frames with a
//! flush-gated readiness handshake.

#![deny(unsafe_code)]

pub mod catalog;
pub mod hash;
pub mod ipc;
pub mod metrics;
pub mod observability;
pub mod registry;
pub mod store;
pub mod types;
pub mod validation;
