//! # Conformance Harness (C12)
//!
//! A category-aware fixture runner: each category directory holds fixture
//! JSON files plus a `manifest.json` declaring the expected outcome for
//! each. The harness produces a deterministic, hashable report so two
//! implementations run against the same fixture set can be compared
//! byte-for-byte.

mod fixture;
mod report;
mod runner;

pub use fixture::{Fixture, FixtureExpectation, Manifest};
pub use report::{ConformanceReport, ResultEntry, SuiteInfo};
pub use runner::run_suite;
