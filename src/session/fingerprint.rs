//! Device fingerprint generation
//!
//! The fingerprint is a SHA-256 digest over nine pipe-joined environment
//! components. If the digest primitive fails, a 32-bit rolling hash of the
//! same input is used instead; it collides far more easily but keeps the
//! operation infallible.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::{ClientEnvironment, DeviceFingerprint};

#[derive(Debug, Error)]
#[error("digest unavailable: {0}")]
pub struct DigestError(pub String);

/// A cryptographic hash over a byte buffer
pub trait DigestPrimitive: Send + Sync {
    fn digest(&self, input: &[u8]) -> Result<Vec<u8>, DigestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digest;

impl DigestPrimitive for Sha256Digest {
    fn digest(&self, input: &[u8]) -> Result<Vec<u8>, DigestError> {
        Ok(Sha256::digest(input).to_vec())
    }
}

#[derive(Clone)]
pub struct Fingerprinter {
    digest: Arc<dyn DigestPrimitive>,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(Arc::new(Sha256Digest))
    }
}

impl Fingerprinter {
    pub fn new(digest: Arc<dyn DigestPrimitive>) -> Self {
        Self { digest }
    }

    pub fn generate(&self, env: &ClientEnvironment) -> DeviceFingerprint {
        let input = fingerprint_input(env);

        match self.digest.digest(input.as_bytes()) {
            Ok(bytes) => DeviceFingerprint::new(to_hex(&bytes)),
            Err(e) => {
                warn!("falling back to rolling hash for fingerprint: {}", e);
                DeviceFingerprint::new(rolling_hash(&input))
            }
        }
    }
}

/// Components in a fixed order; reordering changes every fingerprint
pub fn fingerprint_input(env: &ClientEnvironment) -> String {
    [
        env.user_agent.clone(),
        env.screen_resolution.clone(),
        env.color_depth.to_string(),
        env.timezone.clone(),
        env.language.clone(),
        env.platform.clone(),
        env.hardware_concurrency.to_string(),
        env.max_touch_points.to_string(),
        env.timezone_offset.to_string(),
    ]
    .join("|")
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `h = h * 31 + unit` over UTF-16 code units in wrapping 32-bit signed
/// arithmetic, rendered as the hex of `|h|`
pub fn rolling_hash(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    format!("{:x}", hash.unsigned_abs())
}
