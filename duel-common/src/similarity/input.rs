//! Scoring inputs carried inside a submission's result payload
//!
//! The analysis service emits fingerprints either as bit-strings (`"0110"`)
//! or as arrays of bits (`[0, 1, 1, 0]`), and chunk weights either as
//! lengths or as the chunk source itself. Both forms are accepted here and
//! normalized, so the engine only ever sees bit-strings and integer weights.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-derived bit-string hash of one chunk of submitted code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFingerprint", into = "String")]
pub struct Fingerprint(String);

/// Wire forms a fingerprint may arrive in
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RawFingerprint {
    Text(String),
    Bits(Vec<u8>),
}

impl Fingerprint {
    /// Parse a bit-string, rejecting anything outside the `0`/`1` alphabet
    pub fn parse(bits: &str) -> Result<Self> {
        if let Some(bad) = bits.chars().find(|c| *c != '0' && *c != '1') {
            return Err(Error::ScoringInput(format!(
                "fingerprint contains non-binary character {:?}",
                bad
            )));
        }
        Ok(Self(bits.to_string()))
    }

    /// Build from an array of bits (each 0 or 1)
    pub fn from_bits(bits: &[u8]) -> Result<Self> {
        let mut s = String::with_capacity(bits.len());
        for bit in bits {
            match bit {
                0 => s.push('0'),
                1 => s.push('1'),
                other => {
                    return Err(Error::ScoringInput(format!(
                        "fingerprint bit out of range: {}",
                        other
                    )))
                }
            }
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl TryFrom<RawFingerprint> for Fingerprint {
    type Error = Error;

    fn try_from(raw: RawFingerprint) -> Result<Self> {
        match raw {
            RawFingerprint::Text(s) => Fingerprint::parse(&s),
            RawFingerprint::Bits(bits) => Fingerprint::from_bits(&bits),
        }
    }
}

/// Positional weight of one fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawChunkWeight")]
pub enum ChunkWeight {
    /// Chunk length supplied directly
    Length(u64),
    /// Chunk source text; the weight is its character count
    Source(String),
}

/// Wire forms a chunk weight may arrive in
///
/// JSON producers often emit lengths as floats (`4.0`); those are truncated.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RawChunkWeight {
    Integer(u64),
    Decimal(f64),
    Source(String),
}

impl TryFrom<RawChunkWeight> for ChunkWeight {
    type Error = Error;

    fn try_from(raw: RawChunkWeight) -> Result<Self> {
        match raw {
            RawChunkWeight::Integer(n) => Ok(ChunkWeight::Length(n)),
            RawChunkWeight::Decimal(v) if v.is_finite() && v >= 0.0 => {
                Ok(ChunkWeight::Length(v.trunc() as u64))
            }
            RawChunkWeight::Decimal(v) => Err(Error::ScoringInput(format!(
                "chunk weight must be a non-negative number, got {}",
                v
            ))),
            RawChunkWeight::Source(text) => Ok(ChunkWeight::Source(text)),
        }
    }
}

impl ChunkWeight {
    pub fn weight(&self) -> u64 {
        match self {
            ChunkWeight::Length(n) => *n,
            ChunkWeight::Source(text) => text.chars().count() as u64,
        }
    }
}

/// The part of a `ResultPayload` the Similarity Engine consumes
///
/// Other payload fields (highlight boundaries, proofs, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringInput {
    /// Fingerprints, one per code chunk
    pub hashes2: Vec<Fingerprint>,
    /// Weights, paired positionally with `hashes2`
    #[serde(default)]
    pub code_chunks: Vec<ChunkWeight>,
}

impl ScoringInput {
    /// Extract the scoring fields from an opaque result payload
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        if payload.is_null() {
            return Err(Error::ScoringInput("payload is null".to_string()));
        }
        ScoringInput::deserialize(payload).map_err(|e| Error::ScoringInput(e.to_string()))
    }

    /// Integer weights, positionally aligned with `hashes2`
    pub fn weights(&self) -> Vec<u64> {
        self.code_chunks.iter().map(ChunkWeight::weight).collect()
    }
}
