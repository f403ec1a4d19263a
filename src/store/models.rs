// Data models for the vector store.
//
// These are the types that flow between the index and a store backend.
// They're kept apart from the backends so the index and the analyses can
// use them without depending on rusqlite or sqlx.

use serde::{Deserialize, Serialize};

use crate::corpus::Chunk;

/// Metadata stored next to every vector. `topic_keywords` is persisted as a
/// JSON array and parsed back into a list, never evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub talk_id: String,
    pub chunk_id: u32,
    pub title: String,
    pub speaker: String,
    pub topic_keywords: Vec<String>,
}

/// One indexed chunk: id, vector, document text and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    /// `talk_{talk_id}_chunk_{chunk_id}`
    pub id: String,
    pub vector: Vec<f64>,
    /// The chunk text
    pub document: String,
    pub metadata: RecordMetadata,
}

impl EmbeddingRecord {
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f64>) -> Self {
        Self {
            id: chunk.record_id(),
            vector,
            document: chunk.chunk_text.clone(),
            metadata: RecordMetadata {
                talk_id: chunk.talk_id.clone(),
                chunk_id: chunk.chunk_id,
                title: chunk.title.clone(),
                speaker: chunk.speaker.clone(),
                topic_keywords: chunk.topic_keywords.clone(),
            },
        }
    }
}

/// A nearest-neighbor match.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: RecordMetadata,
    /// Cosine distance, `1 - cosine_similarity`
    pub distance: f64,
}

/// Ranked query matches, ascending distance with ties broken by id.
/// An empty result is a valid answer, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryHit> {
        self.hits.iter()
    }
}

/// Summary of a collection for `trendspotter status`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub record_count: usize,
    pub created_at: String,
    /// None until the first batch is committed
    pub last_indexed_at: Option<String>,
}

/// Order hits by ascending distance, then ascending id.
pub fn rank_hits(hits: &mut [QueryHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, distance: f64) -> QueryHit {
        QueryHit {
            id: id.to_string(),
            document: String::new(),
            metadata: RecordMetadata {
                talk_id: "t".to_string(),
                chunk_id: 0,
                title: String::new(),
                speaker: String::new(),
                topic_keywords: vec![],
            },
            distance,
        }
    }

    #[test]
    fn test_rank_hits_breaks_ties_by_id() {
        let mut hits = vec![hit("b", 0.2), hit("c", 0.1), hit("a", 0.2)];
        rank_hits(&mut hits);
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_from_chunk_derives_id_and_metadata() {
        let chunk = Chunk {
            talk_id: "7".to_string(),
            chunk_id: 2,
            title: "Title".to_string(),
            speaker: "Speaker".to_string(),
            chunk_text: "Body.".to_string(),
            topic_keywords: vec!["body".to_string()],
        };
        let record = EmbeddingRecord::from_chunk(&chunk, vec![1.0, 0.0]);
        assert_eq!(record.id, "talk_7_chunk_2");
        assert_eq!(record.document, "Body.");
        assert_eq!(record.metadata.chunk_id, 2);
        assert_eq!(record.metadata.topic_keywords, vec!["body"]);
    }

    #[test]
    fn test_metadata_keywords_serialize_as_json_array() {
        let meta = RecordMetadata {
            talk_id: "1".to_string(),
            chunk_id: 0,
            title: "t".to_string(),
            speaker: "s".to_string(),
            topic_keywords: vec!["water".to_string(), "climate".to_string()],
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["topic_keywords"], serde_json::json!(["water", "climate"]));
    }
}
