//! Pluggable storage for the pointer transport carrier.
//!
//! Uploading a signed JWS somewhere fetchable is a storage-engine concern
//! this core does not mandate; deployments implement [`PointerUploader`]
//! against whatever object store or database they already run.

use async_trait::async_trait;

use crate::error::VerifyError;

/// Persists a signed receipt JWS somewhere reachable over HTTPS, returning
/// the URL a `PEAC-Receipt-Pointer` header should reference.
#[async_trait]
pub trait PointerUploader: Send + Sync {
    /// Upload `jws` and return the HTTPS URL it can be fetched back from.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::UpstreamUnavailable`] if the upload fails.
    async fn upload(&self, jws: &str) -> Result<url::Url, VerifyError>;
}
