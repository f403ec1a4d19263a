// Query-time analyses over the embedding index.
//
// There are exactly two: trend aggregation and idea validation. `Analyst`
// is the caller-facing entry point that owns one of each over a shared
// index.

pub mod trend;
pub mod validation;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreResult;
use crate::index::EmbeddingIndex;
use trend::{TrendAnalyzer, TrendReport, DEFAULT_TREND_RESULTS};
use validation::{SimilarityValidator, ValidationReport, DEFAULT_VALIDATION_RESULTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    Trends,
    Validation,
}

impl Analysis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Analysis::Trends => "trends",
            Analysis::Validation => "validation",
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "analysis", rename_all = "snake_case")]
pub enum AnalysisReport {
    Trends(TrendReport),
    Validation(ValidationReport),
}

pub struct Analyst {
    trends: TrendAnalyzer,
    validator: SimilarityValidator,
    trend_results: usize,
    validation_results: usize,
}

impl Analyst {
    /// Analyst with the default result counts (20 for trends, 10 for
    /// validation).
    pub fn new(index: Arc<EmbeddingIndex>) -> Self {
        Self {
            trends: TrendAnalyzer::new(Arc::clone(&index)),
            validator: SimilarityValidator::new(index),
            trend_results: DEFAULT_TREND_RESULTS,
            validation_results: DEFAULT_VALIDATION_RESULTS,
        }
    }

    pub fn with_result_counts(mut self, trend_results: usize, validation_results: usize) -> Self {
        self.trend_results = trend_results;
        self.validation_results = validation_results;
        self
    }

    /// Run one analysis on `text`.
    pub async fn process(&self, analysis: Analysis, text: &str) -> CoreResult<AnalysisReport> {
        match analysis {
            Analysis::Trends => self.trend_query(text).await.map(AnalysisReport::Trends),
            Analysis::Validation => self.validate_idea(text).await.map(AnalysisReport::Validation),
        }
    }

    pub async fn trend_query(&self, text: &str) -> CoreResult<TrendReport> {
        self.trends.analyze(text, self.trend_results).await
    }

    pub async fn validate_idea(&self, text: &str) -> CoreResult<ValidationReport> {
        self.validator.validate(text, self.validation_results).await
    }
}

/// First `max_chars` characters of a passage, cut on a char boundary.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
