//! Session id generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Length in bytes of the random material behind a session id.
const ID_BYTES: usize = 32;

/// Generates a new session identifier.
///
/// 256 bits of randomness from the system CSPRNG, base64url-encoded
/// without padding (43 characters). The id is an unguessable server-side
/// handle; it carries no claims.
#[must_use]
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}
