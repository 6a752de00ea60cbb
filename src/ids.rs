//! Random identifiers

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;

/// URL-safe token from `bytes` random bytes (sessions, escalations)
pub fn url_safe_token(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let raw: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(raw)
}

/// Lowercase hex token from `bytes` random bytes (form ids)
pub fn hex_token(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let raw: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();
    hex::encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shapes() {
        let session = url_safe_token(32);
        assert_eq!(session.len(), 43);
        assert!(session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let form = hex_token(4);
        assert_eq!(form.len(), 8);
        assert_ne!(url_safe_token(32), session);
    }
}
