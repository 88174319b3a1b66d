//! SHA1 checksum normalization.
//!
//! Files are identified across pipeline events by the SHA1 of their content,
//! transmitted as hex text. The store keeps the canonical lowercase form.

use crate::error::{Error, Result};

/// Length of a hex encoded SHA1 digest.
pub const SHA1_HEX_LEN: usize = 40;

/// Validate a hex SHA1 and return its lowercase form.
pub fn normalize_sha1(raw: &str) -> Result<String> {
    let s = raw.trim();
    if s.len() != SHA1_HEX_LEN {
        return Err(Error::invalid_input(format!(
            "sha1 must be {} hex characters, got {}",
            SHA1_HEX_LEN,
            s.len()
        )));
    }
    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::invalid_input(format!("sha1 is not hex: {}", s)));
    }
    Ok(s.to_ascii_lowercase())
}
