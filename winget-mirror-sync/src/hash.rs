//! Streaming SHA-256 content hashing.
//!
//! Digests are lowercase hex. Comparisons against manifest-declared values
//! ignore case, since manifests usually carry uppercase digests.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Outcome of checking a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCheck {
    Match,
    Mismatch { computed: String },
}

/// SHA-256 of the file at `path`, read in buffered chunks.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hash `path` and compare it to `expected`.
pub fn verify_file(path: &Path, expected: &str) -> io::Result<HashCheck> {
    let computed = sha256_file(path)?;
    if digests_equal(&computed, expected) {
        Ok(HashCheck::Match)
    } else {
        Ok(HashCheck::Mismatch { computed })
    }
}

/// Case-insensitive hex digest equality.
pub fn digests_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
