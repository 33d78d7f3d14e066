//! Issue keys: stable, collision-checked incident identifiers.
//!
//! Keys follow the documented `TECH-<hex>` convention (e.g. `CMAKE-93af10`).
//! The digest is derived from the technology, the normalized incident
//! context and a monotonic counter, so repeated incidents with identical
//! context still mint distinct keys. The collision table is the only mutable
//! shared state in the system and sits behind a single mutex; incident
//! creation is low-frequency relative to query traffic.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Collision retries before giving up. Exhausting this is a near-impossible
/// operational alarm, not a routine failure.
const MAX_ATTEMPTS: u32 = 16;

/// Wire format of a rendered key.
static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z0-9]+)-([0-9a-f]{6})$").expect("issue key regex"));

pub type Result<T> = std::result::Result<T, IssueKeyError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueKeyError {
    #[error("issue key generation exhausted after {attempts} collision retries")]
    GenerationExhausted { attempts: u32 },

    #[error("technology code `{code}` cannot appear in an issue key")]
    InvalidTechnology { code: String },

    #[error("`{value}` is not a valid issue key")]
    InvalidKey { value: String },
}

/// A minted incident identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct IssueKey {
    /// Uppercase technology code, e.g. `CMAKE`.
    pub technology: String,
    /// Six lowercase hex chars.
    pub hash: String,
    pub created_at_unix_ms: u64,
}

impl IssueKey {
    /// Render the documented wire form, e.g. `CMAKE-93af10`.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}-{}", self.technology, self.hash)
    }

    /// Parse a rendered key back into its parts. `created_at_unix_ms` is not
    /// part of the wire form and comes back as zero.
    pub fn parse(value: &str) -> Result<Self> {
        let captures = KEY_RE
            .captures(value)
            .ok_or_else(|| IssueKeyError::InvalidKey {
                value: value.to_string(),
            })?;
        Ok(Self {
            technology: captures[1].to_string(),
            hash: captures[2].to_string(),
            created_at_unix_ms: 0,
        })
    }
}

impl std::fmt::Display for IssueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

struct KeyState {
    counter: u64,
    issued: HashSet<(String, String)>,
}

/// Mints issue keys, enforcing per-process uniqueness of `(technology, hash)`
/// through a mutex-guarded collision table.
pub struct IssueKeyService {
    state: Mutex<KeyState>,
}

impl Default for IssueKeyService {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueKeyService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KeyState {
                counter: 0,
                issued: HashSet::new(),
            }),
        }
    }

    /// Mint a key for an incident in `technology` described by
    /// `incident_context`.
    pub fn generate(&self, technology: &str, incident_context: &str) -> Result<IssueKey> {
        let technology = technology.trim().to_uppercase();
        if technology.is_empty() || !technology.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IssueKeyError::InvalidTechnology { code: technology });
        }

        let context = normalize_context(incident_context);
        let mut state = self.state.lock().expect("issue key state lock poisoned");

        for attempt in 0..MAX_ATTEMPTS {
            let counter = state.counter;
            state.counter += 1;

            let digest = Sha256::digest(format!("{technology}|{context}|{counter}").as_bytes());
            let hash = format!("{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2]);

            if state.issued.insert((technology.clone(), hash.clone())) {
                return Ok(IssueKey {
                    technology,
                    hash,
                    created_at_unix_ms: now_unix_ms(),
                });
            }
            log::warn!(
                "Issue key collision for {technology} (attempt {})",
                attempt + 1
            );
        }

        Err(IssueKeyError::GenerationExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Number of keys minted so far in this process.
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.state
            .lock()
            .expect("issue key state lock poisoned")
            .issued
            .len()
    }
}

/// Incident context normalization: collapsed whitespace, lowercased — the
/// same rules applied to symptom signatures.
fn normalize_context(context: &str) -> String {
    context
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn renders_the_documented_wire_form() {
        let service = IssueKeyService::new();
        let key = service
            .generate("cmake", "generator mismatch in build dir")
            .expect("generate");
        assert_eq!(key.technology, "CMAKE");
        assert!(KEY_RE.is_match(&key.render()));
    }

    #[test]
    fn render_parse_round_trips() {
        let service = IssueKeyService::new();
        let key = service.generate("DOCKER", "no space left").expect("generate");
        let parsed = IssueKey::parse(&key.render()).expect("parse");
        assert_eq!(parsed.technology, key.technology);
        assert_eq!(parsed.hash, key.hash);
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["cmake-93af10", "CMAKE-93AF10", "CMAKE-93af1", "CMAKE93af10", ""] {
            assert!(matches!(
                IssueKey::parse(bad),
                Err(IssueKeyError::InvalidKey { .. })
            ));
        }
    }

    #[test]
    fn rejects_unusable_technology_codes() {
        let service = IssueKeyService::new();
        assert!(matches!(
            service.generate("", "context"),
            Err(IssueKeyError::InvalidTechnology { .. })
        ));
        assert!(matches!(
            service.generate("C MAKE", "context"),
            Err(IssueKeyError::InvalidTechnology { .. })
        ));
    }

    #[test]
    fn identical_context_still_mints_distinct_keys() {
        let service = IssueKeyService::new();
        let first = service.generate("GIT", "same incident").expect("first");
        let second = service.generate("GIT", "same incident").expect("second");
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn never_repeats_a_hash_within_a_technology() {
        let service = IssueKeyService::new();
        let mut seen = HashSet::new();
        for i in 0..10_000 {
            let key = service
                .generate("K8S", &format!("pod eviction wave {i}"))
                .expect("generate");
            assert!(seen.insert(key.hash.clone()), "duplicate hash {}", key.hash);
        }
        assert_eq!(service.issued_count(), 10_000);
    }

    proptest! {
        #[test]
        fn proptest_rendered_keys_match_the_convention(
            tech in "[A-Z0-9]{2,8}",
            context in ".{0,64}",
        ) {
            let service = IssueKeyService::new();
            let key = service.generate(&tech, &context).expect("generate");
            prop_assert!(KEY_RE.is_match(&key.render()));
        }
    }
}
