use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Verifies the integrity and authenticity of plugin artifacts.
///
/// Both checks return `Ok(false)` on a clean mismatch; errors are
/// reserved for I/O failures and malformed verification material.
pub struct ArtifactVerifier;

impl ArtifactVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Compare the SHA-256 of `bytes` against `expected` (hex-encoded,
    /// case-insensitive).
    pub fn checksum_matches(bytes: &[u8], expected: &str) -> bool {
        let digest = hex::encode(Sha256::digest(bytes));
        digest.eq_ignore_ascii_case(expected.trim())
    }

    /// Compare the SHA-256 of the file at `path` against `expected`.
    pub fn verify_checksum(&self, path: &Path, expected: &str) -> Result<bool> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;

        Ok(Self::checksum_matches(&bytes, expected))
    }

    /// Verify a detached ed25519 signature (base64) over `bytes` with the
    /// publisher's verifying key (base64, 32 bytes).
    pub fn signature_valid(bytes: &[u8], signature_b64: &str, public_key_b64: &str) -> Result<bool> {
        if signature_b64.trim().is_empty() || public_key_b64.trim().is_empty() {
            anyhow::bail!("empty signature or verifying key");
        }

        let sig_bytes = BASE64
            .decode(signature_b64.trim())
            .context("signature is not valid base64")?;
        let key_bytes = BASE64
            .decode(public_key_b64.trim())
            .context("verifying key is not valid base64")?;

        let key_arr: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("verifying key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&key_arr).context("malformed verifying key")?;
        let sig = Signature::from_slice(&sig_bytes).context("malformed signature")?;

        Ok(key.verify(bytes, &sig).is_ok())
    }

    /// File-based variant of [`Self::signature_valid`].
    pub fn verify_signature(
        &self,
        path: &Path,
        signature_b64: &str,
        public_key_b64: &str,
    ) -> Result<bool> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;

        Self::signature_valid(&bytes, signature_b64, public_key_b64)
    }
}

impl Default for ArtifactVerifier {
    fn default() -> Self {
        Self::new()
    }
}
