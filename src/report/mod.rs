//! Report renderers for the aggregated version matrix.
//!
//! - [`terminal`] — colored summary box, package×repository matrix table, and
//!   per-repository error table; respects `--verbose` / `--quiet`.
//!
//! JSON output is plain `serde_json` serialization of [`crate::models::Report`]
//! and lives at the CLI boundary.

pub mod terminal;
