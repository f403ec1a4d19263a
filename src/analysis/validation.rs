// Idea validation: how close is a candidate talk idea to talks that exist?
//
// The nearest passages are re-embedded alongside the idea and compared by
// cosine similarity. The highest similarity picks a ValidationStatus band;
// every passage above the "similar" threshold is listed as evidence.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::snippet;
use crate::embeddings::cosine_similarity;
use crate::error::CoreResult;
use crate::index::EmbeddingIndex;
use crate::store::QueryHit;

/// Candidates retrieved per validation unless the caller asks otherwise.
pub const DEFAULT_VALIDATION_RESULTS: usize = 10;

/// Passages strictly above this similarity are reported as similar talks.
pub const SIMILAR_TALK_THRESHOLD: f64 = 0.70;

const SNIPPET_CHARS: usize = 150;

/// Originality tier of an idea. Bands are strict `>` and checked high to low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    HighlySimilar,
    Similar,
    SomewhatCovered,
    Unique,
}

impl ValidationStatus {
    /// Determine the tier from the maximum cosine similarity.
    pub fn from_similarity(max_similarity: f64) -> Self {
        match max_similarity {
            s if s > 0.85 => ValidationStatus::HighlySimilar,
            s if s > 0.70 => ValidationStatus::Similar,
            s if s > 0.50 => ValidationStatus::SomewhatCovered,
            _ => ValidationStatus::Unique,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::HighlySimilar => "HIGHLY_SIMILAR",
            ValidationStatus::Similar => "SIMILAR",
            ValidationStatus::SomewhatCovered => "SOMEWHAT_COVERED",
            ValidationStatus::Unique => "UNIQUE",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ValidationStatus::HighlySimilar => {
                "Your idea is very similar to existing talks. Consider a different angle."
            }
            ValidationStatus::Similar => {
                "Similar ideas exist, but there may be room for a fresh perspective."
            }
            ValidationStatus::SomewhatCovered => {
                "Some related content exists, but your idea has potential for originality."
            }
            ValidationStatus::Unique => {
                "Your idea appears to be quite unique! Great potential for a TEDx talk."
            }
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            ValidationStatus::HighlySimilar => &[
                "Find a unique perspective or application",
                "Focus on recent developments or personal experience",
                "Combine with other concepts for originality",
            ],
            ValidationStatus::Similar => &[
                "Identify what's unique about your approach",
                "Focus on underexplored aspects",
                "Consider audience-specific angles",
            ],
            ValidationStatus::SomewhatCovered => &[
                "Your idea has good potential",
                "Consider how to differentiate from existing talks",
                "Focus on your unique insights or experience",
            ],
            ValidationStatus::Unique => &[
                "Excellent! Your idea seems original",
                "Focus on clear storytelling and practical applications",
                "Consider the broader impact of your idea",
            ],
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message used instead of the UNIQUE band message when nothing was found
/// to compare against.
pub const NO_CANDIDATES_MESSAGE: &str = "Your idea appears to be unique! No similar talks found.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarTalk {
    pub title: String,
    pub speaker: String,
    pub similarity: f64,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub idea: String,
    pub status: ValidationStatus,
    pub max_similarity: f64,
    /// Candidates above the similar threshold, most similar first
    pub similar_talks: Vec<SimilarTalk>,
    pub message: String,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    /// UNIQUE with similarity 0.0, for a blank idea or an empty index.
    pub fn no_candidates(idea: &str) -> Self {
        let status = ValidationStatus::Unique;
        Self {
            idea: idea.to_string(),
            status,
            max_similarity: 0.0,
            similar_talks: Vec::new(),
            message: NO_CANDIDATES_MESSAGE.to_string(),
            recommendations: owned(status.recommendations()),
        }
    }
}

pub struct SimilarityValidator {
    index: Arc<EmbeddingIndex>,
}

impl SimilarityValidator {
    pub fn new(index: Arc<EmbeddingIndex>) -> Self {
        Self { index }
    }

    /// Classify how original `idea_text` is against the indexed talks.
    ///
    /// The idea is embedded once and used for retrieval; the retrieved
    /// passages are then re-embedded in one call. Stored vectors aren't
    /// reused for the comparison.
    pub async fn validate(&self, idea_text: &str, n_results: usize) -> CoreResult<ValidationReport> {
        if idea_text.trim().is_empty() {
            return Ok(ValidationReport::no_candidates(idea_text));
        }

        let idea_vector = self.index.embed_one(idea_text).await?;
        let result = self.index.query_with_embedding(&idea_vector, n_results).await?;
        if result.is_empty() {
            return Ok(ValidationReport::no_candidates(idea_text));
        }

        let documents: Vec<String> = result.iter().map(|hit| hit.document.clone()).collect();
        let doc_vectors = self.index.embed_texts(&documents).await?;

        let similarities: Vec<f64> = doc_vectors
            .iter()
            .map(|v| cosine_similarity(&idea_vector, v))
            .collect();

        let report = classify(idea_text, &result.hits, &similarities);

        info!(
            status = %report.status,
            max_similarity = report.max_similarity,
            similar = report.similar_talks.len(),
            "Idea validation complete"
        );

        Ok(report)
    }
}

/// Build a report from candidates and their similarity to the idea (same
/// order). No candidates means UNIQUE with 0.0.
pub fn classify(idea: &str, hits: &[QueryHit], similarities: &[f64]) -> ValidationReport {
    if hits.is_empty() || similarities.is_empty() {
        return ValidationReport::no_candidates(idea);
    }

    let max_similarity = similarities
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let mut similar_talks: Vec<SimilarTalk> = hits
        .iter()
        .zip(similarities)
        .filter(|(_, &sim)| sim > SIMILAR_TALK_THRESHOLD)
        .map(|(hit, &sim)| SimilarTalk {
            title: hit.metadata.title.clone(),
            speaker: hit.metadata.speaker.clone(),
            similarity: sim,
            snippet: snippet(&hit.document, SNIPPET_CHARS),
        })
        .collect();
    // Stable: equal similarities keep retrieval order
    similar_talks.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    let status = ValidationStatus::from_similarity(max_similarity);

    ValidationReport {
        idea: idea.to_string(),
        status,
        max_similarity,
        similar_talks,
        message: status.message().to_string(),
        recommendations: owned(status.recommendations()),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordMetadata;

    fn hit(title: &str) -> QueryHit {
        QueryHit {
            id: title.to_string(),
            document: format!("{title} body"),
            metadata: RecordMetadata {
                talk_id: title.to_string(),
                chunk_id: 0,
                title: title.to_string(),
                speaker: "Speaker".to_string(),
                topic_keywords: vec![],
            },
            distance: 0.0,
        }
    }

    #[test]
    fn test_bands_are_strict() {
        assert_eq!(ValidationStatus::from_similarity(0.86), ValidationStatus::HighlySimilar);
        assert_eq!(ValidationStatus::from_similarity(0.85), ValidationStatus::Similar);
        assert_eq!(ValidationStatus::from_similarity(0.70), ValidationStatus::SomewhatCovered);
        assert_eq!(ValidationStatus::from_similarity(0.50), ValidationStatus::Unique);
        assert_eq!(ValidationStatus::from_similarity(-0.3), ValidationStatus::Unique);
    }

    #[test]
    fn test_status_strings_and_recommendations() {
        assert_eq!(ValidationStatus::SomewhatCovered.to_string(), "SOMEWHAT_COVERED");
        for status in [
            ValidationStatus::HighlySimilar,
            ValidationStatus::Similar,
            ValidationStatus::SomewhatCovered,
            ValidationStatus::Unique,
        ] {
            assert_eq!(status.recommendations().len(), 3);
            assert!(!status.message().is_empty());
        }
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&ValidationStatus::HighlySimilar).unwrap();
        assert_eq!(json, "\"HIGHLY_SIMILAR\"");
    }

    #[test]
    fn test_classify_filters_and_sorts_similar_talks() {
        let hits = vec![hit("a"), hit("b"), hit("c"), hit("d")];
        let sims = vec![0.72, 0.95, 0.70, 0.72];
        let report = classify("idea", &hits, &sims);

        assert_eq!(report.status, ValidationStatus::HighlySimilar);
        assert!((report.max_similarity - 0.95).abs() < 1e-12);
        let titles: Vec<_> = report.similar_talks.iter().map(|t| t.title.as_str()).collect();
        // 0.70 is not above the threshold; ties keep retrieval order
        assert_eq!(titles, vec!["b", "a", "d"]);
        assert_eq!(report.message, ValidationStatus::HighlySimilar.message());
    }

    #[test]
    fn test_classify_exactly_seventy_is_somewhat_covered() {
        let report = classify("idea", &[hit("a")], &[0.70]);
        assert_eq!(report.status, ValidationStatus::SomewhatCovered);
        assert!(report.similar_talks.is_empty());
    }

    #[test]
    fn test_classify_no_candidates_is_unique_zero() {
        let report = classify("idea", &[], &[]);
        assert_eq!(report.status, ValidationStatus::Unique);
        assert_eq!(report.max_similarity, 0.0);
        assert_eq!(report.message, NO_CANDIDATES_MESSAGE);
        assert_eq!(report.recommendations.len(), 3);
    }
}
