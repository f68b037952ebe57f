//! Heuristic validation of captured side-artifacts (preview images).
//!
//! Blank or error captures are small and near-uniform; a size gate plus a
//! byte-diversity sample rejects them cheaply. This is not a content
//! classifier; occasional false verdicts are acceptable.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Tunable thresholds for artifact validation.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactPolicy {
    /// Encoded artifacts below this size are blank/placeholder captures.
    pub min_encoded_bytes: usize,
    /// How many decoded bytes to sample for diversity.
    pub sample_len: usize,
    /// Minimum distinct byte values in the sample.
    pub min_distinct_bytes: usize,
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self {
            min_encoded_bytes: 5 * 1024,
            sample_len: 1000,
            min_distinct_bytes: 20,
        }
    }
}

/// Validation record for one artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Artifact {
    pub size_bytes: usize,
    pub distinct_sampled: usize,
    pub valid: bool,
}

impl ArtifactPolicy {
    /// Validate raw artifact bytes.
    pub fn is_valid(&self, bytes: &[u8]) -> bool {
        bytes.len() >= self.min_encoded_bytes
            && self.distinct_sample(bytes) >= self.min_distinct_bytes
    }

    /// Validate a base64-encoded artifact, keeping the measurements.
    /// Undecodable input is invalid.
    pub fn evaluate_base64(&self, encoded: &str) -> Artifact {
        let size_bytes = encoded.len();
        if size_bytes < self.min_encoded_bytes {
            return Artifact {
                size_bytes,
                distinct_sampled: 0,
                valid: false,
            };
        }
        match BASE64.decode(encoded.trim()) {
            Ok(decoded) => {
                let distinct_sampled = self.distinct_sample(&decoded);
                Artifact {
                    size_bytes,
                    distinct_sampled,
                    valid: distinct_sampled >= self.min_distinct_bytes,
                }
            }
            Err(_) => Artifact {
                size_bytes,
                distinct_sampled: 0,
                valid: false,
            },
        }
    }

    fn distinct_sample(&self, bytes: &[u8]) -> usize {
        let sample = &bytes[..bytes.len().min(self.sample_len)];
        let mut seen = [false; 256];
        let mut distinct = 0;
        for &b in sample {
            if !seen[b as usize] {
                seen[b as usize] = true;
                distinct += 1;
            }
        }
        distinct
    }
}
