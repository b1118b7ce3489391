//! Owner capability tokens.
//!
//! Ownership of a zone is proven by a bearer capability: an unguessable
//! secret issued once at zone creation and presented on every privileged
//! call. The token is never derived from the owner's username, and only its
//! SHA-256 hash is persisted.

use sha2::{Digest, Sha256};

/// Hashes a capability token for at-rest storage and comparison.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// An unguessable secret proving owner authority over a zone.
///
/// Distinct from a username on purpose: whoever holds the token controls
/// the zone, from any device.
#[derive(Clone, PartialEq, Eq)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Generates a fresh high-entropy token (32 random bytes, base64-url).
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(base64_url::encode(&bytes))
    }

    /// The raw token value, for returning to the creating client exactly once.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// SHA-256 hash of the token, for persistence.
    #[must_use]
    pub fn hash(&self) -> String {
        hash_token(&self.0)
    }

    /// Checks the token against a stored hash.
    #[must_use]
    pub fn matches_hash(&self, stored_hash: &str) -> bool {
        self.hash() == stored_hash
    }
}

impl From<String> for OwnerToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for OwnerToken {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl std::fmt::Debug for OwnerToken {
    // Bearer credential: keep it out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OwnerToken(..)")
    }
}
