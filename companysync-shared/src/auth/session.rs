/// Session token generation and hashing
///
/// Tokens look like `cs_` followed by 32 base62 characters. The plaintext
/// token only ever exists in the client's cookie; the database stores its
/// SHA-256 hex digest.
///
/// # Example
///
/// ```
/// use companysync_shared::auth::session::{generate_session_token, hash_session_token};
///
/// let (token, hash) = generate_session_token();
/// assert!(token.starts_with("cs_"));
/// assert_eq!(hash, hash_session_token(&token));
/// ```

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Token prefix
pub const TOKEN_PREFIX: &str = "cs_";

/// Length of the random part of a token
const TOKEN_RANDOM_LENGTH: usize = 32;

/// Total token length
pub const SESSION_TOKEN_LENGTH: usize = TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH;

/// Random base62 string of the given length
pub fn random_alphanumeric(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a new session token
///
/// Returns `(plaintext_token, sha256_hex)`.
pub fn generate_session_token() -> (String, String) {
    let token = format!("{}{}", TOKEN_PREFIX, random_alphanumeric(TOKEN_RANDOM_LENGTH));
    let hash = hash_session_token(&token);
    (token, hash)
}

/// SHA-256 of the token, hex encoded (64 characters)
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap syntactic check run before touching the database
pub fn is_well_formed(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LENGTH
        && token.starts_with(TOKEN_PREFIX)
        && token[TOKEN_PREFIX.len()..].bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_format() {
        let (token, hash) = generate_session_token();

        assert_eq!(token.len(), SESSION_TOKEN_LENGTH);
        assert!(is_well_formed(&token));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_session_token();
        let (b, _) = generate_session_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_session_token("cs_abc"), hash_session_token("cs_abc"));
        assert_ne!(hash_session_token("cs_abc"), hash_session_token("cs_abd"));
        // sha256("") prefix
        assert!(hash_session_token("").starts_with("e3b0c442"));
    }

    #[test]
    fn test_is_well_formed() {
        assert!(is_well_formed("cs_abcdefghijklmnopqrstuvwxyz012345"));
        assert!(!is_well_formed("xx_abcdefghijklmnopqrstuvwxyz012345"));
        assert!(!is_well_formed("cs_short"));
        assert!(!is_well_formed("cs_abcdefghijklmnopqrstuvwxyz01234!"));
        assert!(!is_well_formed("cs_abcdefghijklmnopqrstuvwxyz0123é"));
    }
}
