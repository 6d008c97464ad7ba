//! The deterministic, hashable report a conformance run produces.

use serde::Serialize;

/// Identifies the fixture set a report was produced against.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SuiteInfo {
    /// Human-readable suite name (the fixture root directory's file name).
    pub name: String,
    /// `base64url(SHA-256(JCS(manifests + fixtures)))`, so two runs against
    /// the same fixture set produce the same digest regardless of which
    /// implementation ran them.
    pub vectors_digest: String,
}

/// Pass/fail tally across all categories.
#[derive(Clone, Debug, Serialize, Default, PartialEq, Eq)]
pub struct Summary {
    /// Total fixtures evaluated.
    pub total: usize,
    /// Fixtures whose actual outcome matched the manifest's expectation.
    pub passed: usize,
    /// Fixtures whose actual outcome diverged from the manifest.
    pub failed: usize,
}

/// The outcome of running one fixture.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ResultEntry {
    /// Category directory this fixture belongs to.
    pub category: String,
    /// Fixture file name.
    pub fixture: String,
    /// Whether the actual outcome matched the manifest's expectation.
    pub passed: bool,
    /// Whether the fixture actually verified.
    pub actual_valid: bool,
    /// The stable error code actually produced, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_error_code: Option<String>,
    /// A short explanation when `passed` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<String>,
}

/// A full conformance run against one fixture suite.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ConformanceReport {
    /// Which fixture set this report covers.
    pub suite: SuiteInfo,
    /// Free-text identifier for the implementation under test (e.g. a crate
    /// name and version).
    pub implementation: String,
    /// Pass/fail tally.
    pub summary: Summary,
    /// Deterministically ordered per-fixture results: sorted by category,
    /// then by fixture file name.
    pub results: Vec<ResultEntry>,
}
