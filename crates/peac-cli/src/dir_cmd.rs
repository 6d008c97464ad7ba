use anyhow::{Context, Result};
use peac_core::jwks::{AllowAll, SsrfGuardConfig};
use peac_core::policy::PolicyDiscoverer;

use crate::EXIT_IO_ERROR;

pub(crate) async fn run(url: &str) -> Result<u8> {
    let resource = url::Url::parse(url).with_context(|| format!("`{url}` is not a valid URL"))?;
    let client = reqwest::Client::new();
    let allowlist = AllowAll;
    let discoverer = PolicyDiscoverer::new(&client, SsrfGuardConfig::default(), &allowlist);

    let descriptors = match discoverer.discover(&resource).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(EXIT_IO_ERROR);
        }
    };

    if descriptors.is_empty() {
        println!("no policy descriptors found for {resource}");
    } else {
        for d in &descriptors {
            println!("{:?}\t{}", d.kind, d.url);
        }
    }

    Ok(crate::EXIT_PASS)
}
