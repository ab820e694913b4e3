//! Deterministic logical id generation
//!
//! Ids are built by concatenating parts and dropping every character that is
//! not ASCII alphanumeric. Content-addressed ids append the first eight hex
//! characters of a SHA-256 digest, so they change exactly when the content does.

use once_cell::sync::Lazy;
use regex::Regex;
use sam_translator_common::{Result, TransformError};
use sha2::{Digest, Sha256};
use tracing::trace;

/// Longest logical id CloudFormation accepts
pub const MAX_LENGTH: usize = 255;

/// Number of digest characters appended by hashed ids
pub const HASH_LENGTH: usize = 8;

/// Prepended when an id would otherwise not start with a letter
const LEADING_LETTER: char = 'A';

static LOGICAL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("valid logical id pattern"));

/// Logical id generator
pub struct LogicalIdGenerator;

impl LogicalIdGenerator {
    /// Concatenate parts into a valid logical id
    pub fn generate(parts: &[&str]) -> String {
        let mut id: String = parts
            .iter()
            .flat_map(|part| part.chars())
            .filter(char::is_ascii_alphanumeric)
            .collect();
        if !id.starts_with(|c: char| c.is_ascii_alphabetic()) {
            id.insert(0, LEADING_LETTER);
        }
        id.truncate(MAX_LENGTH);
        trace!(%id, "generated logical id");
        id
    }

    /// `generate(parts)` followed by a digest of `data`
    pub fn generate_hashed(data: &str, parts: &[&str]) -> String {
        let mut base = Self::generate(parts);
        base.truncate(MAX_LENGTH - HASH_LENGTH);
        let id = format!("{}{}", base, Self::digest(data));
        trace!(%id, "generated hashed logical id");
        id
    }

    /// Id of an API deployment. Changes if and only if the definition text changes.
    pub fn generate_api_deployment_id(api_name: &str, definition: &str) -> String {
        Self::generate_hashed(definition, &[api_name, "Deployment"])
    }

    /// First [`HASH_LENGTH`] hex characters of the SHA-256 digest of `data`
    pub fn digest(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(HASH_LENGTH);
        hex
    }

    pub fn is_valid(logical_id: &str) -> bool {
        logical_id.len() <= MAX_LENGTH && LOGICAL_ID_PATTERN.is_match(logical_id)
    }

    /// Check a logical id against CloudFormation's naming rules
    pub fn validate(logical_id: &str) -> Result<()> {
        if logical_id.len() > MAX_LENGTH {
            return Err(TransformError::InvalidIdentifier {
                logical_id: logical_id.to_string(),
                reason: format!("longer than {} characters", MAX_LENGTH),
            });
        }
        if !LOGICAL_ID_PATTERN.is_match(logical_id) {
            return Err(TransformError::InvalidIdentifier {
                logical_id: logical_id.to_string(),
                reason: "must be alphanumeric and start with a letter".to_string(),
            });
        }
        Ok(())
    }
}
