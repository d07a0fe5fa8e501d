//! Consistent, irreversible identifier hashing
//!
//! Maps a raw identifier plus a salt domain to a fixed-length hex token.
//! The token is the referential-integrity contract between anonymized
//! tables: the same value in the same domain yields the same token across
//! all workers and all runs with the same configuration.
//!
//! Each domain key is derived once with PBKDF2-HMAC-SHA256 over the domain's
//! base salt. The domain label is mixed into the derivation, so two domains
//! never share a key even if their base salts are misconfigured to be equal.

use crate::domain::AnonymizationError;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::SaltsConfig;

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 rounds for domain key derivation. Derivation happens once per
/// domain at startup, so the cost is paid per process, not per record.
const DERIVATION_ROUNDS: u32 = 10_000;

/// Derived key length in bytes
const KEY_LEN: usize = 32;

/// Default token length in hex characters
pub const TOKEN_LEN: usize = 64;

/// Token length used for inline text redaction markers
pub const INLINE_TOKEN_LEN: usize = 16;

/// Salt domains, one per identifier namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaltDomain {
    /// Free-text hashing and cross-entity values
    Global,
    /// User identifiers
    User,
    /// Organization identifiers
    Organization,
    /// Assessment and response identifiers
    Assessment,
    /// Session identifiers
    Session,
}

impl SaltDomain {
    /// Stable label mixed into key derivation
    pub fn label(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::User => "user",
            Self::Organization => "organization",
            Self::Assessment => "assessment",
            Self::Session => "session",
        }
    }

    /// All domains, used for eager derivation at startup
    pub fn all() -> [SaltDomain; 5] {
        [
            Self::Global,
            Self::User,
            Self::Organization,
            Self::Assessment,
            Self::Session,
        ]
    }
}

/// Deterministic, non-reversible identifier hasher
///
/// Thread-safe; share via `Arc`. Derived keys are memoized per domain and
/// immutable once computed. All five domain keys are derived eagerly in the
/// constructor so a bad salt is a startup failure, never a per-record one.
pub struct IdentityHasher {
    derived_keys: RwLock<HashMap<SaltDomain, [u8; KEY_LEN]>>,
}

impl IdentityHasher {
    /// Create a hasher, deriving all domain keys up front
    ///
    /// # Errors
    ///
    /// Returns [`AnonymizationError::InvalidSalt`] if any configured salt is
    /// empty. Key derivation failure is fatal here by design: the pipeline
    /// must refuse to start rather than emit inconsistent tokens.
    pub fn new(salts: &SaltsConfig) -> Result<Self, AnonymizationError> {
        let mut keys = HashMap::with_capacity(5);
        for domain in SaltDomain::all() {
            let base_salt = salts.for_domain(domain);
            if base_salt.expose_secret().is_empty() {
                return Err(AnonymizationError::InvalidSalt(domain.label().to_string()));
            }
            let key = derive_domain_key(base_salt.expose_secret().as_ref(), domain);
            keys.insert(domain, key);
        }
        Ok(Self {
            derived_keys: RwLock::new(keys),
        })
    }

    /// Hash a raw value into the given domain at the default token length
    ///
    /// Empty input returns an empty string rather than a token, so absent
    /// identifiers stay absent in the output.
    pub fn hash(&self, value: &str, domain: SaltDomain) -> Result<String, AnonymizationError> {
        self.hash_with_len(value, domain, TOKEN_LEN)
    }

    /// Hash a raw value, truncating the hex token to `len` characters
    pub fn hash_with_len(
        &self,
        value: &str,
        domain: SaltDomain,
        len: usize,
    ) -> Result<String, AnonymizationError> {
        if value.is_empty() {
            return Ok(String::new());
        }

        let key = {
            let keys = self
                .derived_keys
                .read()
                .map_err(|_| AnonymizationError::Hashing("derived key lock poisoned".into()))?;
            // All domains are derived in the constructor; a miss here would
            // mean a new variant was added without updating `all()`.
            keys.get(&domain).copied().ok_or_else(|| {
                AnonymizationError::KeyDerivation {
                    domain: domain.label().to_string(),
                    reason: "domain key not derived".to_string(),
                }
            })?
        };

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AnonymizationError::Hashing(e.to_string()))?;
        mac.update(value.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());

        let len = len.min(digest.len());
        Ok(digest[..len].to_string())
    }
}

/// Derive a 32-byte domain key from the base salt and the domain label
fn derive_domain_key(base_salt: &str, domain: SaltDomain) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    let salt = format!("mantle:domain:{}", domain.label());
    pbkdf2_hmac::<Sha256>(
        base_salt.as_bytes(),
        salt.as_bytes(),
        DERIVATION_ROUNDS,
        &mut key,
    );
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaltsConfig;

    fn hasher() -> IdentityHasher {
        IdentityHasher::new(&SaltsConfig::for_tests()).unwrap()
    }

    #[test]
    fn test_deterministic_across_calls() {
        let h = hasher();
        let a = h.hash("user-123", SaltDomain::User).unwrap();
        let b = h.hash("user-123", SaltDomain::User).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), TOKEN_LEN);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = hasher().hash("user-123", SaltDomain::User).unwrap();
        let b = hasher().hash("user-123", SaltDomain::User).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_domains_never_collide() {
        let h = hasher();
        let user = h.hash("id-1", SaltDomain::User).unwrap();
        let org = h.hash("id-1", SaltDomain::Organization).unwrap();
        let session = h.hash("id-1", SaltDomain::Session).unwrap();
        assert_ne!(user, org);
        assert_ne!(user, session);
        assert_ne!(org, session);
    }

    #[test]
    fn test_equal_base_salts_still_separate_domains() {
        // Misconfiguration: every domain shares one base salt. The domain
        // label mixed into derivation must still keep tokens apart.
        let salts = SaltsConfig::uniform_for_tests("same-salt-everywhere");
        let h = IdentityHasher::new(&salts).unwrap();
        let user = h.hash("id-1", SaltDomain::User).unwrap();
        let org = h.hash("id-1", SaltDomain::Organization).unwrap();
        assert_ne!(user, org);
    }

    #[test]
    fn test_empty_input_not_hashed() {
        let h = hasher();
        assert_eq!(h.hash("", SaltDomain::User).unwrap(), "");
    }

    #[test]
    fn test_truncated_token_is_prefix() {
        let h = hasher();
        let full = h.hash("x@y.com", SaltDomain::Global).unwrap();
        let short = h
            .hash_with_len("x@y.com", SaltDomain::Global, INLINE_TOKEN_LEN)
            .unwrap();
        assert_eq!(short.len(), INLINE_TOKEN_LEN);
        assert!(full.starts_with(&short));
    }

    #[test]
    fn test_empty_salt_is_fatal() {
        let salts = SaltsConfig::uniform_for_tests("");
        assert!(matches!(
            IdentityHasher::new(&salts),
            Err(AnonymizationError::InvalidSalt(_))
        ));
    }

    #[test]
    fn test_token_differs_from_input() {
        let h = hasher();
        let token = h.hash("u1", SaltDomain::User).unwrap();
        assert_ne!(token, "u1");
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
