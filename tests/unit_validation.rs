// Unit tests for the query-time analyses: validation bands, similar-talk
// selection, and the trend gap/coverage arithmetic.

use trendspotter::analysis::trend::{build_report, count_topics, gap_analysis};
use trendspotter::analysis::validation::{classify, ValidationStatus, NO_CANDIDATES_MESSAGE};
use trendspotter::store::{QueryHit, QueryResult, RecordMetadata};

fn hit(id: &str, title: &str, document: &str, keywords: &[&str]) -> QueryHit {
    QueryHit {
        id: id.to_string(),
        document: document.to_string(),
        metadata: RecordMetadata {
            talk_id: id.to_string(),
            chunk_id: 0,
            title: title.to_string(),
            speaker: "Speaker".to_string(),
            topic_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        },
        distance: 0.2,
    }
}

// ============================================================
// ValidationStatus bands
// ============================================================

#[test]
fn band_boundaries_are_exclusive() {
    let cases = [
        (1.0, ValidationStatus::HighlySimilar),
        (0.8500001, ValidationStatus::HighlySimilar),
        (0.85, ValidationStatus::Similar),
        (0.7000001, ValidationStatus::Similar),
        (0.70, ValidationStatus::SomewhatCovered),
        (0.5000001, ValidationStatus::SomewhatCovered),
        (0.50, ValidationStatus::Unique),
        (0.0, ValidationStatus::Unique),
    ];
    for (similarity, expected) in cases {
        assert_eq!(
            ValidationStatus::from_similarity(similarity),
            expected,
            "similarity {similarity}"
        );
    }
}

#[test]
fn status_messages_are_fixed() {
    assert_eq!(
        ValidationStatus::Unique.message(),
        "Your idea appears to be quite unique! Great potential for a TEDx talk."
    );
    assert_eq!(
        ValidationStatus::Similar.recommendations()[0],
        "Identify what's unique about your approach"
    );
}

// ============================================================
// classify
// ============================================================

#[test]
fn classify_reports_max_and_similar_talks() {
    let hits = vec![
        hit("a", "Water wars", "rivers and water", &[]),
        hit("b", "Desert bloom", "sand and rain", &[]),
        hit("c", "Ocean depth", "the deep sea", &[]),
    ];
    let report = classify("water in deserts", &hits, &[0.75, 0.40, 0.81]);

    assert_eq!(report.status, ValidationStatus::Similar);
    assert!((report.max_similarity - 0.81).abs() < 1e-12);
    let titles: Vec<_> = report.similar_talks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Ocean depth", "Water wars"]);
    assert_eq!(report.recommendations.len(), 3);
}

#[test]
fn classify_seventy_exactly_is_not_similar() {
    let hits = vec![hit("a", "Edge", "edge case", &[])];
    let report = classify("edge", &hits, &[0.70]);
    assert_eq!(report.status, ValidationStatus::SomewhatCovered);
    assert!(report.similar_talks.is_empty());
}

#[test]
fn classify_without_candidates_is_unique() {
    let report = classify("anything", &[], &[]);
    assert_eq!(report.status, ValidationStatus::Unique);
    assert_eq!(report.max_similarity, 0.0);
    assert_eq!(report.message, NO_CANDIDATES_MESSAGE);
}

// ============================================================
// Trend arithmetic
// ============================================================

#[test]
fn coverage_counts_passage_words_against_gaps() {
    let gaps = gap_analysis("solar wind tides", ["solar panels", "wind farms"].into_iter());
    // Covered: {solar, panels, wind, farms} = 4; gaps: {tides} = 1
    assert_eq!(gaps.covered_word_count, 4);
    assert_eq!(gaps.gap_words, vec!["tides"]);
    assert!((gaps.coverage_score - 0.8).abs() < 1e-12);

    let gaps = gap_analysis("alpha beta gamma delta", ["gamma delta epsilon"].into_iter());
    assert!((gaps.coverage_score - 0.6).abs() < 1e-12);
}

#[test]
fn coverage_nothing_on_either_side_is_zero() {
    let gaps = gap_analysis("   ", std::iter::empty());
    assert_eq!(gaps.covered_word_count, 0);
    assert_eq!(gaps.coverage_score, 0.0);
}

#[test]
fn gap_matching_is_case_insensitive() {
    let gaps = gap_analysis("CLIMATE Policy", ["climate policy now"].into_iter());
    assert!(gaps.gap_words.is_empty());
}

#[test]
fn topic_counts_tie_on_first_occurrence() {
    let a: Vec<String> = vec!["zinc".into(), "iron".into()];
    let b: Vec<String> = vec!["iron".into(), "zinc".into(), "gold".into()];
    let (top, distinct) = count_topics([a.as_slice(), b.as_slice()].into_iter());
    assert_eq!(distinct, 3);
    let names: Vec<_> = top.iter().map(|t| t.topic.as_str()).collect();
    assert_eq!(names, vec!["zinc", "iron", "gold"]);
}

#[test]
fn trend_report_lists_matches_in_rank_order() {
    let result = QueryResult {
        hits: vec![
            hit("a", "First", "urban farming", &["farming", "urban"]),
            hit("b", "Second", "rooftop farming", &["farming", "rooftop"]),
        ],
    };
    let report = build_report("urban farming", &result);
    assert_eq!(report.matched_talks[0].title, "First");
    assert_eq!(report.matched_talks[1].rank, 2);
    assert_eq!(report.top_topics[0].topic, "farming");
    assert_eq!(report.top_topics[0].count, 2);
    assert_eq!(report.total_distinct_topics, 3);
}
