//! # Ingestion
//!
//! Tabular-file ingestion boundary.
//!
//! Responsibilities:
//! - Read a CSV file into an ordered sequence of row mappings
//! - Fail with `EmptyOrUnparseable` when nothing usable comes out
//!
//! Column semantics are the caller's concern; this crate performs no header
//! guessing or normalization beyond whitespace trimming.

mod reader;

pub use reader::{read_rows, read_rows_from};
