//! The persisted pair (vectors + metadata) and its on-disk encodings.
//!
//! `vectors.bin` layout, little-endian:
//! `b"CLVX" | version: u32 | dim: u32 | count: u64 | count * dim * f32`.
//!
//! `metadata.json` is `{"version": 2, "dimension": D, "records": [...]}`.
//! Version 1 files were a bare JSON array whose entries are either plain
//! chunk strings or `{text, source}` objects; they are upgraded on read.

use serde::{Deserialize, Serialize};

use caselake_core::types::IndexedRecord;
use caselake_core::{Error, Result};

/// Source name given to version-1 records that carried no source.
pub const UNKNOWN_SOURCE: &str = "(unknown)";

const VECTORS_MAGIC: &[u8; 4] = b"CLVX";
const VECTORS_VERSION: u32 = 1;
const VECTORS_HEADER_LEN: usize = 4 + 4 + 4 + 8;
const METADATA_VERSION: u32 = 2;

/// Vectors stored row-major in one flat buffer plus the aligned records.
///
/// A snapshot read back from storage may be misaligned (`vector_count() !=
/// records.len()`); the index refuses writes and searches on such a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    pub dimension: usize,
    pub vectors: Vec<f32>,
    pub records: Vec<IndexedRecord>,
}

impl IndexSnapshot {
    pub fn empty(dimension: usize) -> Self {
        Self { dimension, vectors: Vec::new(), records: Vec::new() }
    }

    pub fn vector_count(&self) -> usize {
        if self.dimension == 0 { 0 } else { self.vectors.len() / self.dimension }
    }

    pub fn is_aligned(&self) -> bool {
        self.vector_count() == self.records.len()
    }

    pub fn vector(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }
}

pub fn encode_vectors(dimension: usize, vectors: &[f32]) -> Vec<u8> {
    let count = if dimension == 0 { 0 } else { vectors.len() / dimension };
    let mut out = Vec::with_capacity(VECTORS_HEADER_LEN + vectors.len() * 4);
    out.extend_from_slice(VECTORS_MAGIC);
    out.extend_from_slice(&VECTORS_VERSION.to_le_bytes());
    out.extend_from_slice(&(dimension as u32).to_le_bytes());
    out.extend_from_slice(&(count as u64).to_le_bytes());
    for v in vectors {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Returns `(dimension, flat vectors)`.
pub fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<f32>)> {
    if bytes.len() < VECTORS_HEADER_LEN || &bytes[..4] != VECTORS_MAGIC {
        return Err(Error::Storage("vectors file has no valid header".into()));
    }
    let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let version = word(4);
    if version != VECTORS_VERSION {
        return Err(Error::Storage(format!("unsupported vectors file version {}", version)));
    }
    let dimension = word(8) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;
    let body = &bytes[VECTORS_HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::Storage("vectors header declares an impossible size".into()))?;
    if body.len() != expected {
        return Err(Error::Storage(format!(
            "vectors file truncated: header declares {} x {} floats, found {} bytes",
            count,
            dimension,
            body.len()
        )));
    }
    let vectors = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dimension, vectors))
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    version: u32,
    dimension: usize,
    records: Vec<IndexedRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataOnDisk {
    Current(MetadataFile),
    V1(Vec<V1Record>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum V1Record {
    Text(String),
    Record { text: String, source: Option<String> },
}

impl From<V1Record> for IndexedRecord {
    fn from(old: V1Record) -> Self {
        match old {
            V1Record::Text(text) => IndexedRecord { text, source: UNKNOWN_SOURCE.to_string() },
            V1Record::Record { text, source } => IndexedRecord {
                text,
                source: source.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            },
        }
    }
}

pub fn encode_metadata(dimension: usize, records: &[IndexedRecord]) -> Result<Vec<u8>> {
    let file = MetadataFile { version: METADATA_VERSION, dimension, records: records.to_vec() };
    Ok(serde_json::to_vec(&file)?)
}

#[derive(Debug)]
pub struct DecodedMetadata {
    pub dimension: Option<usize>,
    pub records: Vec<IndexedRecord>,
    /// True when the file was in the version-1 layout.
    pub upgraded: bool,
}

pub fn decode_metadata(bytes: &[u8]) -> Result<DecodedMetadata> {
    match serde_json::from_slice::<MetadataOnDisk>(bytes)? {
        MetadataOnDisk::Current(file) => {
            if file.version != METADATA_VERSION {
                return Err(Error::Storage(format!("unsupported metadata version {}", file.version)));
            }
            Ok(DecodedMetadata { dimension: Some(file.dimension), records: file.records, upgraded: false })
        }
        MetadataOnDisk::V1(old) => Ok(DecodedMetadata {
            dimension: None,
            records: old.into_iter().map(IndexedRecord::from).collect(),
            upgraded: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_round_trip() {
        let v = vec![0.5, -1.0, 2.25, 3.0, 0.0, 1e-7];
        let (dim, back) = decode_vectors(&encode_vectors(3, &v)).unwrap();
        assert_eq!(dim, 3);
        assert_eq!(back, v);
    }

    #[test]
    fn truncated_vectors_are_rejected() {
        let mut bytes = encode_vectors(2, &[1.0, 2.0, 3.0, 4.0]);
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(decode_vectors(&bytes), Err(Error::Storage(_))));
        assert!(matches!(decode_vectors(b"nope"), Err(Error::Storage(_))));

        let mut huge = encode_vectors(3072, &[]);
        huge[12..20].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
        assert!(matches!(decode_vectors(&huge), Err(Error::Storage(_))));
    }

    #[test]
    fn v1_metadata_is_upgraded() {
        let raw = br#"["old plain chunk", {"text": "new", "source": "fashion_retail.pdf"}, {"text": "orphan"}]"#;
        let decoded = decode_metadata(raw).unwrap();
        assert!(decoded.upgraded);
        assert_eq!(decoded.dimension, None);
        assert_eq!(decoded.records[0].source, UNKNOWN_SOURCE);
        assert_eq!(decoded.records[1].source, "fashion_retail.pdf");
        assert_eq!(decoded.records[2].text, "orphan");
    }

    #[test]
    fn current_metadata_is_read_as_is() {
        let records = vec![IndexedRecord { text: "t".into(), source: "s.pdf".into() }];
        let decoded = decode_metadata(&encode_metadata(4, &records).unwrap()).unwrap();
        assert!(!decoded.upgraded);
        assert_eq!(decoded.dimension, Some(4));
        assert_eq!(decoded.records, records);
    }
}
