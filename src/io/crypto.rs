use sha2::{Digest, Sha256};
use std::{fs::File, io::Read, path::Path};

use crate::error::Result;

/// Streaming SHA-256 check against an expected hex digest.
pub fn verify_sha256(path: &Path, expected_hex: &str) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let actual = hex::encode(hasher.finalize());
    Ok(actual.eq_ignore_ascii_case(expected_hex))
}
