//! Saved facts: storage, similarity search, keyword fallback, and the
//! [`recall::MemoryService`] that ties them to the embedding pipeline.

pub mod keywords;
pub mod recall;
pub mod search;
pub mod similarity;
pub mod store;
pub mod types;

/// Encode an embedding as a little-endian f32 blob.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob. Returns `None` if the length is not a
/// multiple of four.
pub fn embedding_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip() {
        let v = vec![0.25f32, -1.5, 3.0];
        let bytes = embedding_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(embedding_from_bytes(&bytes), Some(v));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert_eq!(embedding_from_bytes(&[0, 0, 128]), None);
    }
}
