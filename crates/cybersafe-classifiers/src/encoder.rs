//! Feature encoding
//!
//! Converts raw text into the fixed-length vector consumed by every risk
//! model. Encoding never fails on content: oversized text is truncated,
//! text without tokens maps to the zero vector. Only construction can fail.

use cybersafe_core::{Error, PipelineConfig, Result, SensitiveText};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

/// Pure, deterministic text encoder
pub trait FeatureEncoder: Send + Sync {
    /// Length of every vector this encoder produces
    fn dimension(&self) -> usize;

    /// Encode text. Must not retain any state across calls.
    fn encode(&self, text: &str) -> FeatureVector;
}

/// Fixed-length feature vector.
///
/// Derived from raw text, so it is not `Clone` and its values are zeroed
/// on drop.
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// All-zero vector of the given length
    pub fn zeros(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim],
        }
    }

    /// Wrap precomputed values
    pub fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean norm
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

impl Drop for FeatureVector {
    fn drop(&mut self) {
        self.values.zeroize();
    }
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeatureVector(dim={})", self.values.len())
    }
}

/// Signed feature-hashing encoder.
///
/// Lowercases the text, splits it on non-alphanumeric characters, and hashes
/// every token into one of `dim` buckets with a hash-derived sign. The
/// result is L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dim: usize,
    max_chars: usize,
}

impl HashingEncoder {
    /// Create an encoder producing `dim`-length vectors from at most
    /// `max_chars` characters of input
    pub fn new(dim: usize, max_chars: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::encode("feature dimension must be greater than zero"));
        }
        if max_chars == 0 {
            return Err(Error::encode("character limit must be greater than zero"));
        }
        Ok(Self { dim, max_chars })
    }

    /// Create an encoder matching the pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.feature_dim, config.max_text_chars)
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        (bucket, sign)
    }
}

impl FeatureEncoder for HashingEncoder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn encode(&self, text: &str) -> FeatureVector {
        let mut vector = FeatureVector::zeros(self.dim);

        // The lowercased copy is text too; it is wiped when dropped. Sized
        // up front so no partial copy is left behind by a reallocation.
        let chars = || text.chars().take(self.max_chars).flat_map(char::to_lowercase);
        let mut buffer = String::with_capacity(chars().map(char::len_utf8).sum());
        buffer.extend(chars());
        let lowered = SensitiveText::new(buffer);

        let tokens = lowered
            .expose()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());

        for token in tokens {
            let (bucket, sign) = self.bucket(token);
            vector.values[bucket] += sign;
        }

        let norm = vector.norm();
        if norm > 0.0 {
            for value in vector.values.iter_mut() {
                *value /= norm;
            }
        }

        vector
    }
}
