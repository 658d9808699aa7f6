//! Stable job identities for a store that has no primary key.
//!
//! A fingerprint is the human identifier followed by a digest of the
//! identifier and its salts, e.g. `nightly-sync.3f6c0e...`. It is embedded in
//! the entry's annotation and found again by substring search.

use std::fmt;

use {
    regex::Regex,
    sha2::{Digest, Sha256},
};

use crate::{Error, Result};

/// Hex characters of the digest kept in the token (128 bits).
const DIGEST_HEX_LEN: usize = 32;

/// Deterministic identity token for one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A regex matching this token literally anywhere in an annotation.
    pub fn pattern(&self) -> Result<Regex> {
        Ok(Regex::new(&regex::escape(&self.0))?)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the fingerprint of `identifier` salted with `salts`, in order.
///
/// Parts are hashed with a NUL separator so that moving characters between
/// adjacent parts changes the token.
#[must_use]
pub fn fingerprint<S: AsRef<str>>(identifier: &str, salts: &[S]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    for salt in salts {
        hasher.update([0u8]);
        hasher.update(salt.as_ref().as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    Fingerprint(format!("{identifier}.{}", &digest[..DIGEST_HEX_LEN]))
}

/// Check that an identifier can be embedded in a single-line annotation.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(Error::validation("identifier is empty"));
    }
    if identifier.chars().any(char::is_control) {
        return Err(Error::validation(format!(
            "identifier {identifier:?} contains control characters"
        )));
    }
    // cron turns `%` in the command field into a newline.
    if identifier.contains('%') {
        return Err(Error::validation(format!(
            "identifier '{identifier}' must not contain '%'"
        )));
    }
    Ok(())
}

/// A job's human identifier together with its derived fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    identifier: String,
    fingerprint: Fingerprint,
}

impl JobIdentity {
    /// Validate `identifier` and derive its fingerprint from `salts`.
    pub fn new<S: AsRef<str>>(identifier: &str, salts: &[S]) -> Result<Self> {
        validate_identifier(identifier)?;
        Ok(Self {
            identifier: identifier.to_string(),
            fingerprint: fingerprint(identifier, salts),
        })
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
