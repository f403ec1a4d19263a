// Colored terminal output for trend and validation reports.
//
// All terminal-specific formatting lives here; main.rs only decides which
// report to show.

use colored::Colorize;

use crate::analysis::trend::TrendReport;
use crate::analysis::validation::{ValidationReport, ValidationStatus};
use crate::analysis::AnalysisReport;

/// Characters of each passage shown in the terminal (reports keep more).
const PREVIEW_CHARS: usize = 140;

pub fn display_report(report: &AnalysisReport) {
    match report {
        AnalysisReport::Trends(r) => display_trend_report(r),
        AnalysisReport::Validation(r) => display_validation_report(r),
    }
}

/// Display a trend report: top topics, coverage and the matched talks.
pub fn display_trend_report(report: &TrendReport) {
    println!(
        "\n{}",
        format!("=== Trends near \"{}\" ===", report.query).bold()
    );

    if report.no_matches {
        println!("\n  {}", report.summary.dimmed());
        println!("  Index some talks first: `trendspotter index chunks.jsonl`");
        return;
    }

    println!();
    println!(
        "  {:>4}  {:<30} {:>6}",
        "Rank".dimmed(),
        "Topic".dimmed(),
        "Count".dimmed(),
    );
    println!("  {}", "-".repeat(44).dimmed());
    for (i, topic) in report.top_topics.iter().enumerate() {
        println!("  {:>4}. {:<30} {:>6}", i + 1, topic.topic, topic.count);
    }
    println!(
        "  ({} distinct topics across {} passages)",
        report.total_distinct_topics,
        report.matched_talks.len()
    );

    println!();
    println!(
        "  Coverage: {}  ({} words covered)",
        colorize_coverage(report.coverage_score),
        report.covered_word_count
    );
    if report.gap_words.is_empty() {
        println!("  Gaps: {}", "none".dimmed());
    } else {
        println!("  Gaps: {}", report.gap_words.join(", ").yellow());
    }

    println!("\n{}", "Related talks:".bold());
    for talk in &report.matched_talks {
        println!(
            "  {:>2}. {} {} {}",
            talk.rank,
            talk.title.bold(),
            format!("by {}", talk.speaker).dimmed(),
            format!("(distance {:.3})", talk.distance).dimmed(),
        );
        println!(
            "      {}",
            super::truncate_chars(&talk.snippet, PREVIEW_CHARS).dimmed()
        );
    }

    println!("\n{}", report.summary);
}

/// Display an idea validation verdict with evidence and recommendations.
pub fn display_validation_report(report: &ValidationReport) {
    println!("\n{}", "=== Idea Validation ===".bold());
    println!("  Idea: {}", report.idea);
    println!(
        "  Status: {}  (max similarity {:.2})",
        colorize_status(report.status),
        report.max_similarity
    );
    println!("\n  {}", report.message);

    if !report.similar_talks.is_empty() {
        println!("\n{}", "Similar talks:".bold());
        for talk in &report.similar_talks {
            println!(
                "  [{:.2}] {} {}",
                talk.similarity,
                talk.title.bold(),
                format!("by {}", talk.speaker).dimmed()
            );
            println!(
                "         {}",
                super::truncate_chars(&talk.snippet, PREVIEW_CHARS).dimmed()
            );
        }
    }

    println!("\n{}", "Recommendations:".bold());
    for rec in &report.recommendations {
        println!("  - {rec}");
    }
    println!();
}

fn colorize_status(status: ValidationStatus) -> colored::ColoredString {
    match status {
        ValidationStatus::HighlySimilar => status.as_str().red().bold(),
        ValidationStatus::Similar => status.as_str().bright_red(),
        ValidationStatus::SomewhatCovered => status.as_str().yellow(),
        ValidationStatus::Unique => status.as_str().green().bold(),
    }
}

fn colorize_coverage(score: f64) -> colored::ColoredString {
    let text = format!("{score:.2}");
    match score {
        s if s >= 0.99 => text.green(),
        s if s >= 0.9 => text.yellow(),
        _ => text.bright_red(),
    }
}
