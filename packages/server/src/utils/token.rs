use rand::Rng;

/// `prefix` followed by `bytes` random bytes, hex-encoded.
pub fn random_token(prefix: &str, bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill(buf.as_mut_slice());
    format!("{prefix}{}", hex::encode(buf))
}

/// Lookup key sent in `X-API-Key`.
pub fn api_key() -> String {
    random_token("pk_", 16)
}

/// HMAC signing secret.
pub fn api_secret() -> String {
    random_token("sk_", 32)
}

/// Public container lookup key.
pub fn container_key() -> String {
    random_token("ck_", 12)
}
