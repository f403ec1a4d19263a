// Corpus processing: raw transcript rows -> talks -> chunks.
//
// This is the hand-off between text processing and indexing. Each input
// row becomes one immutable `Talk` (cleaned transcript plus keywords and
// counts), and each talk is cut into `Chunk`s that carry the talk's
// metadata along so the index can store it next to every vector.
//
// Files on disk are JSON Lines: one corpus row or one chunk per line.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::text::{chunker, normalizer};

/// Source identifier of a corpus row. Scraped exports carry either a
/// numeric index or an opaque string id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Number(n) => write!(f, "{n}"),
            RowId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One row of the input corpus, as exported by the scraper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusRow {
    /// Falls back to the row's position in the file when absent
    #[serde(default)]
    pub talk_id: Option<RowId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    /// Missing transcripts are treated as empty text
    #[serde(default)]
    pub transcript: Option<String>,
}

/// A processed talk. Built once by `process_rows` and never modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Talk {
    pub talk_id: String,
    pub title: String,
    pub speaker: String,
    pub raw_transcript: String,
    pub cleaned_transcript: String,
    /// Most frequent first
    pub topic_keywords: Vec<String>,
    pub word_count: usize,
    pub sentence_count: usize,
}

/// A retrievable passage of a talk's cleaned transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub talk_id: String,
    /// Position within the talk, starting at 0
    pub chunk_id: u32,
    pub title: String,
    pub speaker: String,
    pub chunk_text: String,
    /// Inherited from the owning talk
    pub topic_keywords: Vec<String>,
}

impl Chunk {
    /// Stable, globally unique record id for this chunk.
    ///
    /// Derived only from (talk_id, chunk_id), so re-indexing the same chunk
    /// overwrites its record instead of adding a second one.
    pub fn record_id(&self) -> String {
        format!("talk_{}_chunk_{}", self.talk_id, self.chunk_id)
    }
}

/// Knobs for turning transcripts into chunks.
#[derive(Debug, Clone)]
pub struct ChunkingOptions {
    /// Target chunk size in characters
    pub max_chars: usize,
    /// Characters of trailing sentences to repeat at the start of the next
    /// chunk (0 = no overlap)
    pub overlap: usize,
    /// How many keywords to keep per talk
    pub topics_per_talk: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap: 0,
            topics_per_talk: 10,
        }
    }
}

/// Output of corpus processing.
#[derive(Debug, Clone, Default)]
pub struct ProcessedCorpus {
    pub talks: Vec<Talk>,
    pub chunks: Vec<Chunk>,
}

/// Clean, analyze and chunk every row of the corpus.
///
/// Fails with `InvalidArgument` when a row has no title or speaker, or when
/// two rows share a talk id. A missing transcript is not an error: the talk
/// is kept with empty text and produces no chunks.
pub fn process_rows(rows: &[CorpusRow], options: &ChunkingOptions) -> CoreResult<ProcessedCorpus> {
    let mut corpus = ProcessedCorpus::default();
    let mut seen_ids = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let talk = build_talk(index, row, options)?;

        if !seen_ids.insert(talk.talk_id.clone()) {
            return Err(CoreError::invalid(format!(
                "row {index}: duplicate talk_id {}",
                talk.talk_id
            )));
        }

        let passages = chunker::chunk(&talk.cleaned_transcript, options.max_chars, options.overlap);
        for (chunk_id, chunk_text) in passages.into_iter().enumerate() {
            corpus.chunks.push(Chunk {
                talk_id: talk.talk_id.clone(),
                chunk_id: chunk_id as u32,
                title: talk.title.clone(),
                speaker: talk.speaker.clone(),
                chunk_text,
                topic_keywords: talk.topic_keywords.clone(),
            });
        }

        corpus.talks.push(talk);
    }

    info!(
        talks = corpus.talks.len(),
        chunks = corpus.chunks.len(),
        "Processed corpus"
    );

    Ok(corpus)
}

fn build_talk(index: usize, row: &CorpusRow, options: &ChunkingOptions) -> CoreResult<Talk> {
    let title = required_field(index, "title", row.title.as_deref())?;
    let speaker = required_field(index, "speaker", row.speaker.as_deref())?;

    let talk_id = match &row.talk_id {
        Some(id) => id.to_string(),
        None => index.to_string(),
    };
    if talk_id.trim().is_empty() {
        return Err(CoreError::invalid(format!("row {index}: blank talk_id")));
    }

    let raw_transcript = row.transcript.clone().unwrap_or_default();
    let cleaned_transcript = normalizer::clean(row.transcript.as_deref());
    let topic_keywords = normalizer::extract_topics(&cleaned_transcript, options.topics_per_talk);
    let word_count = cleaned_transcript.split_whitespace().count();
    let sentence_count = chunker::split_sentences(&cleaned_transcript).len();

    Ok(Talk {
        talk_id,
        title,
        speaker,
        raw_transcript,
        cleaned_transcript,
        topic_keywords,
        word_count,
        sentence_count,
    })
}

fn required_field(index: usize, name: &str, value: Option<&str>) -> CoreResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CoreError::invalid(format!("row {index}: missing {name}"))),
    }
}

// --- JSON Lines files ---

/// Read corpus rows from a JSONL file. A line that isn't a valid row fails
/// with `InvalidArgument` naming the line.
pub fn read_rows(path: &Path) -> Result<Vec<CorpusRow>> {
    read_jsonl(path)
}

/// Read the chunk export written by `write_chunks`.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    read_jsonl(path)
}

/// Write the chunk export (the input to `trendspotter index`).
pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    write_jsonl(path, chunks)
}

/// Write processed talks alongside the chunk export.
pub fn write_talks(path: &Path, talks: &[Talk]) -> Result<()> {
    write_jsonl(path, talks)
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut items = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| {
            CoreError::invalid(format!("{} line {}: {e}", path.display(), line_no + 1))
        })?;
        items.push(item);
    }
    Ok(items)
}

fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for {}", path.display()))?;
        }
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
