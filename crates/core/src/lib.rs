//! Shared types for the GophKeeper encrypted vault.
//!
//! This crate holds the pieces every other crate agrees on:
//! - configuration structures loaded by the server binary
//! - the JSON wire types exchanged with clients
//!
//! Payload bytes are opaque everywhere in this workspace: the server never
//! inspects `blob_enc` contents beyond the transport size cap.

pub mod api;
pub mod config;

/// Hard cap on request payload size per call (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default upper bound on the number of intents in a single upsert batch.
pub const DEFAULT_MAX_BATCH: usize = 1000;
