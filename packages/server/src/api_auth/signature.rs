//! HMAC-SHA256 request signatures for the public API.
//!
//! The signed message is the literal concatenation `METHOD + PATH + TIMESTAMP`
//! (e.g. `GET/api/public/v1/files1700000000`), hex-encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, method: &str, path: &str, timestamp: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(timestamp.as_bytes());
    mac
}

/// Hex signature for a request.
pub fn sign(secret: &str, method: &str, path: &str, timestamp: &str) -> String {
    hex::encode(mac(secret, method, path, timestamp).finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify(secret: &str, method: &str, path: &str, timestamp: &str, signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    let expected = mac(secret, method, path, timestamp).finalize().into_bytes();
    expected.as_slice().ct_eq(&provided).into()
}

/// Whether `timestamp` (unix seconds) lies within `window_secs` of `now`.
pub fn timestamp_fresh(timestamp: i64, now: i64, window_secs: i64) -> bool {
    window_secs >= 0 && now.abs_diff(timestamp) <= window_secs as u64
}
