//! Upload request signing.
//!
//! The upstream API authenticates uploads with an MD5 digest over a shared
//! secret, the user id, and the request timestamp, passed as the `sign`
//! query parameter alongside `t`.

use tracing::debug;

/// Shared signing secret expected by the upstream API.
const SIGN_SECRET: &str = "r5YWPjgSGAT2dbOJzwiDBK";

/// Compute the upload signature for `(user_id, timestamp_ms)` as lowercase
/// hex.
pub fn upload_sign(user_id: &str, timestamp_ms: i64) -> String {
    let payload = format!("{SIGN_SECRET}{user_id}{timestamp_ms}");
    let sign = format!("{:x}", md5::compute(payload.as_bytes()));
    debug!(user_id, timestamp_ms, "Computed upload signature");
    sign
}

/// Unit struct for plugging the signature into trait seams (e.g. the
/// pipeline's `SignatureProvider`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Signer;

impl Signer {
    pub fn sign(&self, user_id: &str, timestamp_ms: i64) -> String {
        upload_sign(user_id, timestamp_ms)
    }
}
