// Transcript cleanup and frequency-based topic keywords.
//
// Raw transcripts come out of the scraper full of noise: caption time codes,
// stage directions like "[Applause]" or "(Laughter)", links to slides, and
// the speaker's "um"s. `clean` strips all of that so chunking and keyword
// counting see only what was said.
//
// `extract_topics` is a coarse keyword proxy (the most frequent content
// words in a transcript), not real topic modeling.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TIME_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}").expect("valid regex"));
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]").expect("valid regex"));
static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+|www\.\S+").expect("valid regex"));
static ELLIPSIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{3,}").expect("valid regex"));

/// English stop words from the stop-words crate, lower-cased.
static STOP_WORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    get(LANGUAGE::English)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect()
});

/// Filler tokens dropped when they stand alone.
const FILLERS: [&str; 2] = ["um", "uh"];

/// Tokens shorter than this (in characters) never count as topics.
const MIN_TOPIC_LEN: usize = 4;

/// Clean a raw transcript.
///
/// Total: `None` (a missing transcript cell) yields an empty string. Rules
/// run in a fixed order, with whitespace re-collapsed after every removal so
/// no double spaces survive into tokenization:
///
/// 1. collapse whitespace runs
/// 2. remove time codes (`H:MM` / `HH:MM`)
/// 3. remove `[...]` and `(...)` spans
/// 4. remove URLs
/// 5. remove isolated `um` / `uh`
/// 6. collapse `...` to `.`
pub fn clean(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let text = collapse_whitespace(raw);
    let text = remove(&TIME_CODE, &text);
    let text = remove(&BRACKETED, &text);
    let text = remove(&PARENTHETICAL, &text);
    let text = remove(&URL, &text);
    let text = remove_fillers(&text);
    let text = ELLIPSIS.replace_all(&text, ".");

    collapse_whitespace(&text)
}

/// Return the `top_n` most frequent content words in `cleaned`.
///
/// Tokens are split on non-alphanumeric characters and lower-cased. Stop
/// words and tokens shorter than four characters are discarded. Ties keep
/// the order in which the words first appeared.
pub fn extract_topics(cleaned: &str, top_n: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for token in word_tokens(cleaned) {
        if token.chars().count() < MIN_TOPIC_LEN || STOP_WORDS.contains(&token) {
            continue;
        }
        let count = counts.entry(token.clone()).or_insert(0);
        if *count == 0 {
            first_seen.push(token);
        }
        *count += 1;
    }

    // sort_by is stable, so equal counts stay in first-occurrence order
    first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
    first_seen.truncate(top_n);
    first_seen
}

/// Lower-cased word tokens, split on anything that isn't a letter or digit.
pub fn word_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn remove(pattern: &Regex, text: &str) -> String {
    collapse_whitespace(&pattern.replace_all(text, ""))
}

/// Drop standalone filler tokens. A trailing comma goes with the filler
/// ("um, so" -> "so"). Sentence-ending punctuation moves onto the previous
/// word ("it was um. Then" -> "it was. Then") so sentence boundaries survive.
fn remove_fillers(text: &str) -> String {
    let mut kept: Vec<String> = Vec::new();

    for token in text.split(' ') {
        let bare = token.trim_end_matches([',', '.', '?', '!']);
        if !FILLERS.iter().any(|f| bare.eq_ignore_ascii_case(f)) {
            kept.push(token.to_string());
            continue;
        }

        let ending = token[bare.len()..].trim_start_matches(',');
        if ending.is_empty() {
            continue;
        }
        if let Some(prev) = kept.last_mut() {
            prev.truncate(prev.trim_end_matches(',').len());
            if !prev.ends_with(['.', '?', '!']) {
                prev.push_str(ending);
            }
        }
    }

    kept.join(" ")
}
