//! Compile/upload requests over the broker and retained sketch synchronisation.

pub mod client;
pub mod payload;
pub mod topics;

pub use client::{CorrelationClient, Outcome};
pub use topics::Command;
