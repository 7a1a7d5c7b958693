//! Secret generation and at-rest hashing for agent credentials.
//!
//! Plaintext secrets are handed out exactly once (to the agent or the
//! confirmation URL); only SHA-256 digests are ever persisted.

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

/// Length of generated agent and confirmation secrets.
pub const SECRET_LENGTH: usize = 64;

/// A freshly generated secret together with its persistable digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    plaintext: String,
    digest: String,
}

impl GeneratedSecret {
    /// Generates a random alphanumeric secret of [`SECRET_LENGTH`] characters.
    #[must_use]
    pub fn generate() -> Self {
        let plaintext: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LENGTH)
            .map(char::from)
            .collect();
        let digest = hash_secret(&plaintext);
        Self { plaintext, digest }
    }

    /// Returns the plaintext secret. Callers must not persist this value.
    #[must_use]
    pub fn plaintext(&self) -> &str {
        &self.plaintext
    }

    /// Returns the hex-encoded SHA-256 digest for storage.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Consumes the secret, returning plaintext and digest.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.plaintext, self.digest)
    }
}

/// Computes the hex-encoded SHA-256 digest of a presented secret.
#[must_use]
pub fn hash_secret(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
