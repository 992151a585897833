use rand::RngCore;
use rand::rngs::OsRng;

/// The size of the session token in bytes (256 bits of entropy).
const SESSION_TOKEN_SIZE: usize = 32;

/// Generates a new random session token.
///
/// # Returns
///
/// A lowercase hex-encoded session token.
pub fn generate_session_token() -> String {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);

    hex::encode(token)
}
