use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use peac_core::crypto::CompactJws;
use peac_core::jwks::{JwkSet, Resolver, ResolverConfig};
use peac_core::replay::InMemoryReplayStore;
use peac_core::verifier::{Verifier, VerifyPolicy};

use crate::{read_input, OutputFormat, EXIT_BAD_INPUT, EXIT_PASS, EXIT_VERIFY_FAIL};

pub(crate) async fn run(jws_or_file: &str, keys: Option<&Path>, out: OutputFormat) -> Result<u8> {
    let Some(keys_path) = keys else {
        eprintln!("error: `verify receipt` requires --keys <jwks.json>");
        return Ok(EXIT_BAD_INPUT);
    };

    let jws = read_input(jws_or_file)?;
    let parsed = match CompactJws::parse(&jws) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: not a valid compact JWS: {e}");
            return Ok(EXIT_BAD_INPUT);
        }
    };

    let issuer = peek_issuer(&parsed)?;

    let jwks_bytes = std::fs::read(keys_path).with_context(|| format!("reading {}", keys_path.display()))?;
    let jwk_set: JwkSet =
        serde_json::from_slice(&jwks_bytes).with_context(|| format!("parsing {}", keys_path.display()))?;

    let resolver = Resolver::new(reqwest::Client::new(), ResolverConfig::default());
    for jwk in &jwk_set.keys {
        let verifier = jwk.to_verifier().with_context(|| format!("key `{}` in {}", jwk.kid, keys_path.display()))?;
        resolver.seed(&issuer, verifier, 3600);
    }

    let policy = VerifyPolicy { issuer_allowlist: vec![issuer], unsafe_allow_any_issuer: false, ..VerifyPolicy::default() };
    let verifier = Verifier::new(resolver, Arc::new(InMemoryReplayStore::new()), policy);
    let outcome = verifier.verify(&jws).await;

    match out {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": outcome.valid,
                "code": outcome.code.map(|c| c.as_str()),
                "message": outcome.message,
                "claims": outcome.claims,
                "kid": outcome.kid,
                "timing_ms": outcome.timing.total_ms,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            if outcome.valid {
                println!("VALID (kid={:?}, {}ms)", outcome.kid, outcome.timing.total_ms);
            } else {
                println!(
                    "INVALID: {} — {}",
                    outcome.code.map(|c| c.as_str()).unwrap_or("E_UNKNOWN"),
                    outcome.message.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(if outcome.valid { EXIT_PASS } else { EXIT_VERIFY_FAIL })
}

/// Decode (but do not verify) the payload enough to read `iss`, so the CLI
/// can seed the resolver and issuer allowlist before running the real
/// verification pass.
fn peek_issuer(parsed: &CompactJws) -> Result<String> {
    let payload = parsed.payload_bytes().context("decoding JWS payload")?;
    let value: serde_json::Value = serde_json::from_slice(&payload).context("parsing JWS payload as JSON")?;
    value
        .get("iss")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .context("JWS payload has no `iss` claim")
}
