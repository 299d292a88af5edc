use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

/// Source of opaque secrets handed to clients (refresh and reset tokens).
pub trait TokenGenerator: Send + Sync {
    /// `byte_len` random bytes, encoded as URL-safe text.
    fn generate(&self, byte_len: usize) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsRngTokenGenerator;

impl TokenGenerator for OsRngTokenGenerator {
    fn generate(&self, byte_len: usize) -> String {
        let mut buf = vec![0u8; byte_len];
        OsRng.fill_bytes(&mut buf);
        Base64UrlUnpadded::encode_string(&buf)
    }
}
