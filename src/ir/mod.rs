//! Scan-scoped data model shared by the parser, analyzer, fixer and
//! typosquat checker.
//!
//! Everything here is built once per invocation from external input
//! (lock file text, advisory payloads) and never mutated afterwards.

pub mod dependency;
pub mod version;
pub mod vulnerability;

pub use dependency::{Dependency, DEFAULT_SOURCE};
pub use version::compare_versions;
pub use vulnerability::{Severity, VulnerabilityRecord};
