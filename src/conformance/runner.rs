//! Walks a fixture suite directory and produces a [`ConformanceReport`].
//!
//! A suite directory holds one subdirectory per category. Each category
//! holds a `manifest.json` (a [`Manifest`]) and one JSON file per fixture.
//! Fixtures are evaluated against the claims schema (C1/C3) and, for
//! `payload` fixtures, the compact-JWS transport shape (C4) — the runner
//! does not hold signing keys, so it cannot exercise full end-to-end
//! verification (C8) against arbitrary third-party fixtures; that is left
//! to the integration tests that seed a verifier with known keys.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::canon::{base64url, digest, jcs};
use crate::conformance::fixture::{Fixture, Manifest};
use crate::conformance::report::{ConformanceReport, ResultEntry, Summary, SuiteInfo};
use crate::receipt::ReceiptClaims;
use crate::transport::parse_header;

const MANIFEST_FILE: &str = "manifest.json";

/// Run every category under `suite_dir` and return a deterministic report.
///
/// Categories and fixture files within each category are processed in
/// sorted order, so `results` is stable across runs and across platforms.
///
/// # Errors
///
/// Returns an error if `suite_dir` cannot be read, a category is missing
/// its `manifest.json`, or any fixture file is not valid JSON.
pub fn run_suite(suite_dir: &Path, implementation: &str) -> Result<ConformanceReport> {
    let suite_name = suite_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| suite_dir.display().to_string());

    let mut categories: Vec<_> = fs::read_dir(suite_dir)
        .with_context(|| format!("reading suite directory {}", suite_dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.path())
        .collect();
    categories.sort();

    let mut results = Vec::new();
    let mut digest_input = serde_json::Map::new();

    for category_dir in categories {
        let category = category_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let manifest_path = category_dir.join(MANIFEST_FILE);
        let manifest_bytes = fs::read(&manifest_path)
            .with_context(|| format!("reading {}", manifest_path.display()))?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .with_context(|| format!("parsing {}", manifest_path.display()))?;

        let mut fixture_files: Vec<_> = fs::read_dir(&category_dir)
            .with_context(|| format!("reading category directory {}", category_dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(MANIFEST_FILE))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        fixture_files.sort();

        let mut category_fixtures = serde_json::Map::new();

        for fixture_path in fixture_files {
            let name = fixture_path.file_name().unwrap().to_string_lossy().into_owned();
            let bytes = fs::read(&fixture_path)
                .with_context(|| format!("reading {}", fixture_path.display()))?;
            let raw: serde_json::Value = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing {}", fixture_path.display()))?;
            category_fixtures.insert(name.clone(), raw.clone());

            let fixture: Fixture = serde_json::from_value(raw)
                .with_context(|| format!("parsing fixture shape in {}", fixture_path.display()))?;

            let expectation = manifest.0.get(&name).cloned();
            results.push(evaluate_fixture(&category, &name, &fixture, expectation.as_ref()));
        }

        digest_input.insert(
            category,
            serde_json::json!({ "manifest": manifest.0, "fixtures": category_fixtures }),
        );
    }

    let canonical = jcs::canonicalize_value(&serde_json::Value::Object(digest_input))
        .context("canonicalizing suite contents for vectors_digest")?;
    let vectors_digest = base64url::encode(&digest::sha256(canonical.as_bytes()));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    Ok(ConformanceReport {
        suite: SuiteInfo { name: suite_name, vectors_digest },
        implementation: implementation.to_string(),
        summary: Summary { total, passed, failed: total - passed },
        results,
    })
}

fn evaluate_fixture(
    category: &str,
    name: &str,
    fixture: &Fixture,
    expectation: Option<&crate::conformance::fixture::FixtureExpectation>,
) -> ResultEntry {
    if fixture.is_ambiguous() {
        return ResultEntry {
            category: category.to_string(),
            fixture: name.to_string(),
            passed: false,
            actual_valid: false,
            actual_error_code: Some("E_SCHEMA_VALIDATION_FAILED".to_string()),
            mismatch: Some("fixture sets both `claims` and `payload`".to_string()),
        };
    }

    let (actual_valid, actual_error_code) = if let Some(claims) = &fixture.claims {
        match serde_json::to_vec(claims).map(|b| ReceiptClaims::from_strict_json(&b)) {
            Ok(Ok(_)) => (true, None),
            Ok(Err(e)) => (false, Some(e.code().as_str().to_string())),
            Err(e) => (false, Some(format!("E_SCHEMA_VALIDATION_FAILED: {e}"))),
        }
    } else if let Some(payload) = &fixture.payload {
        match payload.as_str() {
            Some(raw) => match parse_header(raw) {
                Ok(_) => (true, None),
                Err(e) => (false, Some(e.code().as_str().to_string())),
            },
            None => (false, Some("E_INVALID_TRANSPORT".to_string())),
        }
    } else {
        (false, Some("E_SCHEMA_VALIDATION_FAILED".to_string()))
    };

    let mismatch = expectation.and_then(|exp| {
        if exp.expected_valid != actual_valid {
            Some(format!("expected_valid={} actual_valid={actual_valid}", exp.expected_valid))
        } else if !actual_valid && exp.expected_error_code.is_some() && exp.expected_error_code != actual_error_code {
            Some(format!(
                "expected_error_code={:?} actual_error_code={actual_error_code:?}",
                exp.expected_error_code
            ))
        } else {
            None
        }
    });

    let passed = expectation.is_some() && mismatch.is_none();

    ResultEntry {
        category: category.to_string(),
        fixture: name.to_string(),
        passed,
        actual_valid,
        actual_error_code,
        mismatch: mismatch.or_else(|| expectation.is_none().then(|| "no manifest entry for fixture".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn runs_a_minimal_two_category_suite() {
        let dir = std::env::temp_dir().join(format!("peac-conformance-test-{}", std::process::id()));
        let schema_dir = dir.join("schema");
        fs::create_dir_all(&schema_dir).unwrap();

        write_file(
            &schema_dir.join(MANIFEST_FILE),
            r#"{"valid.json": {"expected_valid": true}, "bad-ttl.json": {"expected_valid": false, "expected_error_code": "E_SCHEMA_VALIDATION_FAILED"}}"#,
        );
        write_file(
            &schema_dir.join("valid.json"),
            r#"{"claims": {"iss":"https://p.example","aud":"https://a.example","iat":1700000000,"exp":1700000300,"rid":"r1"}}"#,
        );
        write_file(
            &schema_dir.join("bad-ttl.json"),
            r#"{"claims": {"iss":"https://p.example","aud":"https://a.example","iat":1700000000,"exp":1700200000,"rid":"r2"}}"#,
        );

        let report = run_suite(&dir, "peac-core-test").unwrap();
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 2);
        assert!(!report.suite.vectors_digest.is_empty());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn ambiguous_fixture_fails() {
        let dir = std::env::temp_dir().join(format!("peac-conformance-test-ambig-{}", std::process::id()));
        let cat_dir = dir.join("transport");
        fs::create_dir_all(&cat_dir).unwrap();
        write_file(&cat_dir.join(MANIFEST_FILE), r#"{"both.json": {"expected_valid": false}}"#);
        write_file(&cat_dir.join("both.json"), r#"{"claims": {}, "payload": "x"}"#);

        let report = run_suite(&dir, "peac-core-test").unwrap();
        assert_eq!(report.summary.total, 1);
        assert!(report.results[0].mismatch.as_deref().unwrap().contains("both"));

        fs::remove_dir_all(&dir).ok();
    }
}
