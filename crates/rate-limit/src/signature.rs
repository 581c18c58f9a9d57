//! Request signature resolution.

use std::fmt;

use sha2::{Digest, Sha256};

/// A stable identity key for one (method, host, path, client address) tuple.
///
/// The key is the lowercase hex SHA-256 digest of the four fields joined
/// with `|`. Hashing keeps store keys to a fixed length and free of
/// unbounded or unsafe characters regardless of path size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Resolve the signature for a request.
    ///
    /// All four fields may be empty; an absent host or client address is
    /// passed as an empty string rather than treated as an error. Identical
    /// tuples always resolve to the identical signature.
    pub fn resolve(method: &str, host: &str, path: &str, client_addr: &str) -> Self {
        let mut hasher = Sha256::new();

        hasher.update(method.as_bytes());
        hasher.update(b"|");
        hasher.update(host.as_bytes());
        hasher.update(b"|");
        hasher.update(path.as_bytes());
        hasher.update(b"|");
        hasher.update(client_addr.as_bytes());

        let digest = hasher.finalize();

        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }

        Self(hex)
    }

    /// The hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
