//! Domain layer - pure logic with no dependency on the logging host.
//!
//! This layer contains the core concepts of the crate:
//! - Severities and the labels records are tallied under
//! - The record model and exception kinds
//! - Sliding-window admission
//! - Tallies, dump formats and threshold rules
//!
//! All types in this layer are pure and easily testable.

pub mod error_kind;
pub mod record;
pub mod rule;
pub mod severity;
pub mod signal;
pub mod tally;
pub mod window;
