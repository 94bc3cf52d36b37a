//! Foreman — dependency-aware orchestration core for short-lived workers.
//!
//! Two coupled subsystems do the real work: a scheduler that turns work
//! items with declared dependencies and touched-file sets into maximally
//! parallel execution waves, and a durable knowledge store whose entries are
//! reassembled into token-budgeted context bundles for each dispatch.

pub mod assembler;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handoff;
pub mod item;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod store;
