use std::path::Path;

use anyhow::{Context, Result};
use peac_core::canon::digest;
use peac_core::crypto::Ed25519KeyPair;

use crate::{EXIT_BAD_INPUT, EXIT_PASS};

struct Sample {
    id: &'static str,
    description: &'static str,
}

const SAMPLES: &[Sample] = &[
    Sample { id: "s1-basic", description: "Basic issue+verify: matching JWKS, valid=true." },
    Sample { id: "s2-expired", description: "Same claims as s1 but `now` past `exp`: E_EXPIRED_RECEIPT." },
    Sample { id: "s3-replay", description: "Receipt with a nonce, presented twice: second call E_NONCE_REPLAY." },
    Sample { id: "s4-pointer", description: "Pointer-carried receipt; mutating the fetched body by one byte yields E_POINTER_DIGEST_MISMATCH." },
    Sample { id: "s5-ssrf", description: "JWKS URL resolves to the cloud metadata address; resolver rejects pre-fetch with E_SSRF_BLOCKED." },
    Sample { id: "s6-policy-hash", description: "Receipt bound to a policy fingerprint; an ETag change flips the match to E_POLICY_HASH_MISMATCH." },
];

pub(crate) fn list() -> Result<u8> {
    for s in SAMPLES {
        println!("{}\t{}", s.id, s.description);
    }
    Ok(EXIT_PASS)
}

pub(crate) fn show(id: &str) -> Result<u8> {
    match SAMPLES.iter().find(|s| s.id == id) {
        Some(s) => {
            println!("{}", s.description);
            Ok(EXIT_PASS)
        }
        None => {
            eprintln!("error: no such sample `{id}`");
            Ok(EXIT_BAD_INPUT)
        }
    }
}

pub(crate) async fn generate(out: &Path, now: Option<i64>, kid: &str) -> Result<u8> {
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let seed = digest::sha256(kid.as_bytes());
    let key = Ed25519KeyPair::from_seed(&seed).context("deriving sample key from --kid")?;
    let now = now.unwrap_or_else(peac_core::time::unix_now);

    write_claims_fixture(out, "s1-basic.json", &key, kid, now, now + 300, None)?;
    write_claims_fixture(out, "s2-expired.json", &key, kid, now - 1000, now - 700, None)?;
    write_claims_fixture(out, "s3-replay.json", &key, kid, now, now + 300, Some("n-42"))?;
    write_claims_fixture(out, "s6-policy-hash.json", &key, kid, now, now + 300, None)?;

    for (name, note) in [
        ("s4-pointer.md", "Pointer transport scenario: requires a live HTTPS endpoint to serve the fetched body; not representable as a static fixture. See samples show s4-pointer."),
        ("s5-ssrf.md", "SSRF-block scenario: requires pointing the resolver at a JWKS URL that resolves to 169.254.169.254; not representable as a static fixture. See samples show s5-ssrf."),
    ] {
        std::fs::write(out.join(name), note).with_context(|| format!("writing {name}"))?;
    }

    println!("wrote samples to {}", out.display());
    Ok(EXIT_PASS)
}

fn write_claims_fixture(
    out: &Path, file_name: &str, key: &Ed25519KeyPair, kid: &str, iat: i64, exp: i64, nonce: Option<&str>,
) -> Result<()> {
    let claims = serde_json::json!({
        "iss": "https://p.example",
        "aud": "https://a.example",
        "iat": iat,
        "exp": exp,
        "rid": uuid::Uuid::now_v7().to_string(),
        "nonce": nonce,
    });
    let header_json = serde_json::json!({ "alg": "EdDSA", "typ": "application/peac-receipt+jws", "kid": kid }).to_string();
    let payload_json = claims.to_string();
    let jws = peac_core::crypto::sign_compact(key, &header_json, &payload_json)?;

    let fixture = serde_json::json!({ "claims": claims, "jws": jws });
    std::fs::write(out.join(file_name), serde_json::to_vec_pretty(&fixture)?)
        .with_context(|| format!("writing {file_name}"))?;
    Ok(())
}
