//! Fixture and manifest shapes read from a conformance suite directory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What a fixture is expected to produce.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FixtureExpectation {
    /// Whether the fixture is expected to verify successfully.
    pub expected_valid: bool,
    /// Expected stable error code, when `expected_valid` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_error_code: Option<String>,
    /// Expected claim path the failure should be attributed to, when
    /// applicable (e.g. `"purpose_enforced"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_path: Option<String>,
    /// Expected keyword describing the violated constraint (e.g.
    /// `"max-ttl"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_keyword: Option<String>,
}

/// A category's `manifest.json`: fixture file name → expectation.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Manifest(pub HashMap<String, FixtureExpectation>);

/// One fixture file's contents. Exactly one of `claims`/`payload` must be
/// set — a fixture declaring both is ambiguous and rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fixture {
    /// Pre-parsed claim object to validate directly against the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
    /// A raw wire payload (e.g. a compact JWS string) to run through the
    /// full verifier pipeline instead of schema validation alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Fixture {
    /// Whether this fixture sets both `claims` and `payload`, which is
    /// rejected as ambiguous.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.claims.is_some() && self.payload.is_some()
    }
}
