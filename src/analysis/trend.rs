// Trend analysis: which topics cluster around a query, and which parts of
// the query the nearest talks don't cover.
//
// Topic counts come from the keyword lists stored with each matched chunk.
// The gap analysis is lexical: a query word is "covered" when it appears as a
// whitespace token in any matched passage.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::snippet;
use crate::error::CoreResult;
use crate::index::EmbeddingIndex;
use crate::store::QueryResult;

/// Matches retrieved per trend query unless the caller asks otherwise.
pub const DEFAULT_TREND_RESULTS: usize = 20;

/// Topics listed in a report.
pub const TOP_TOPICS: usize = 10;

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

/// A matched passage, ranked from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedTalk {
    pub rank: usize,
    pub title: String,
    pub speaker: String,
    pub snippet: String,
    pub distance: f64,
}

/// Lexical coverage of the query by the matched passages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapAnalysis {
    /// Distinct lower-cased tokens across all matched passages
    pub covered_word_count: usize,
    /// Query words that no matched passage contains, in query order
    pub gap_words: Vec<String>,
    /// covered / (covered + gaps), 0 when both are empty
    pub coverage_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub query: String,
    /// Blank query or empty index; every other field is empty/zero
    pub no_matches: bool,
    pub top_topics: Vec<TopicCount>,
    pub total_distinct_topics: usize,
    pub coverage_score: f64,
    pub covered_word_count: usize,
    pub gap_words: Vec<String>,
    pub matched_talks: Vec<MatchedTalk>,
    pub summary: String,
}

impl TrendReport {
    pub fn no_matches(query: &str) -> Self {
        Self {
            query: query.to_string(),
            no_matches: true,
            top_topics: Vec::new(),
            total_distinct_topics: 0,
            coverage_score: 0.0,
            covered_word_count: 0,
            gap_words: Vec::new(),
            matched_talks: Vec::new(),
            summary: "No relevant talks found".to_string(),
        }
    }
}

pub struct TrendAnalyzer {
    index: Arc<EmbeddingIndex>,
}

impl TrendAnalyzer {
    pub fn new(index: Arc<EmbeddingIndex>) -> Self {
        Self { index }
    }

    /// Query the index and aggregate the matches into a trend report.
    ///
    /// Never fails on an empty match set; only index errors propagate.
    pub async fn analyze(&self, query_text: &str, n_results: usize) -> CoreResult<TrendReport> {
        if query_text.trim().is_empty() {
            return Ok(TrendReport::no_matches(query_text));
        }

        let result = self.index.query(query_text, n_results).await?;
        let report = build_report(query_text, &result);

        info!(
            matches = report.matched_talks.len(),
            topics = report.total_distinct_topics,
            coverage = report.coverage_score,
            "Trend analysis complete"
        );

        Ok(report)
    }
}

/// Turn ranked matches into a report. Pure; `analyze` is a thin wrapper.
pub fn build_report(query: &str, result: &QueryResult) -> TrendReport {
    if result.is_empty() {
        return TrendReport::no_matches(query);
    }

    let (top_topics, total_distinct_topics) =
        count_topics(result.iter().map(|hit| hit.metadata.topic_keywords.as_slice()));
    let gaps = gap_analysis(query, result.iter().map(|hit| hit.document.as_str()));
    let summary = summarize(&top_topics, gaps.coverage_score);

    let matched_talks = result
        .iter()
        .enumerate()
        .map(|(i, hit)| MatchedTalk {
            rank: i + 1,
            title: hit.metadata.title.clone(),
            speaker: hit.metadata.speaker.clone(),
            snippet: snippet(&hit.document, SNIPPET_CHARS),
            distance: hit.distance,
        })
        .collect();

    TrendReport {
        query: query.to_string(),
        no_matches: false,
        top_topics,
        total_distinct_topics,
        coverage_score: gaps.coverage_score,
        covered_word_count: gaps.covered_word_count,
        gap_words: gaps.gap_words,
        matched_talks,
        summary,
    }
}

/// Merge keyword lists (in match order) and return the `TOP_TOPICS` most
/// frequent, plus the number of distinct topics. Ties keep first occurrence.
pub fn count_topics<'a>(
    keyword_lists: impl Iterator<Item = &'a [String]>,
) -> (Vec<TopicCount>, usize) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for topic in keyword_lists.flatten() {
        let count = counts.entry(topic.as_str()).or_insert(0);
        if *count == 0 {
            order.push(topic.as_str());
        }
        *count += 1;
    }

    let distinct = order.len();
    // Stable sort keeps first-occurrence order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));

    let top = order
        .into_iter()
        .take(TOP_TOPICS)
        .map(|topic| TopicCount {
            topic: topic.to_string(),
            count: counts[topic],
        })
        .collect();

    (top, distinct)
}

/// Compare the query's words with the words of the matched passages.
pub fn gap_analysis<'a>(query: &str, documents: impl Iterator<Item = &'a str>) -> GapAnalysis {
    let covered: HashSet<String> = documents
        .flat_map(|doc| doc.split_whitespace())
        .map(str::to_lowercase)
        .collect();

    let mut seen = HashSet::new();
    let gap_words: Vec<String> = query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| !covered.contains(word))
        .filter(|word| seen.insert(word.clone()))
        .collect();

    let c = covered.len();
    let g = gap_words.len();
    let coverage_score = if c + g == 0 {
        0.0
    } else {
        c as f64 / (c + g) as f64
    };

    GapAnalysis {
        covered_word_count: c,
        gap_words,
        coverage_score,
    }
}

fn summarize(top_topics: &[TopicCount], coverage_score: f64) -> String {
    let top = top_topics
        .first()
        .map(|t| t.topic.as_str())
        .unwrap_or("None");
    format!(
        "Trend Analysis Summary:\n- Found {} trending topics\n- Coverage score: {:.2}\n- Top trend: {}",
        top_topics.len(),
        coverage_score,
        top
    )
}
