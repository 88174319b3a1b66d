//! Human-facing identifiers.
//!
//! Every archive entity carries a short alphanumeric UID alongside its UUID.
//! UIDs are what operators and downstream services see; uniqueness within a
//! table is checked by the store when a UID is allocated.

use rand::Rng;

/// Length of a UID.
pub const UID_LENGTH: usize = 8;

const UID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random UID candidate.
pub fn generate_uid() -> String {
    let mut rng = rand::thread_rng();
    (0..UID_LENGTH)
        .map(|_| UID_ALPHABET[rng.gen_range(0..UID_ALPHABET.len())] as char)
        .collect()
}

/// Check the shape of a UID.
pub fn is_valid_uid(uid: &str) -> bool {
    uid.len() == UID_LENGTH && uid.chars().all(|c| c.is_ascii_alphanumeric())
}
