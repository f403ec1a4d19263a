// Sentence-aligned chunking of cleaned transcripts.
//
// Chunks are the unit of indexing and retrieval. They are built greedily from
// whole sentences, so a passage never starts or ends mid-thought. A sentence
// longer than the target size is emitted whole rather than truncated.
//
// Overlap policy: with `overlap_hint == 0` (the default) no sentence appears
// in two chunks, and joining the chunks with single spaces gives back the
// cleaned transcript exactly. With `overlap_hint > 0`, each new chunk is
// seeded with the trailing sentences of the previous one (at most
// `overlap_hint` characters of them, never the whole previous chunk). The
// duplicated prefix is the only difference from the original text.

/// Characters that may trail sentence-ending punctuation and still belong
/// to the sentence (closing quotes and brackets).
const CLOSERS: [char; 6] = ['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];

/// Split text into sentences at `.`, `!` or `?` followed by whitespace.
///
/// Returned slices are trimmed and never empty. "3.5" and "e.g." inside a
/// word don't split because no whitespace follows the period.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }

        // Swallow runs like "?!" or ".)" into the sentence
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminal(next) || CLOSERS.contains(&next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let at_boundary = match chars.peek() {
            Some(&(_, next)) => next.is_whitespace(),
            None => true,
        };
        if at_boundary {
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

/// Split `text` into sentence-aligned chunks of at most `max_chars`
/// characters (except for single sentences that are longer on their own).
pub fn chunk(text: &str, max_chars: usize, overlap_hint: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;
    // Sentences in `current` that weren't carried over from the previous chunk
    let mut fresh = 0;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();

        if !current.is_empty() && current_len + 1 + len > max_chars {
            chunks.push(current.join(" "));

            current = carry_tail(&current, overlap_hint);
            current_len = joined_len(&current);
            fresh = 0;

            // The carry is dropped when it would push the next sentence over
            if !current.is_empty() && current_len + 1 + len > max_chars {
                current.clear();
                current_len = 0;
            }
        }

        current_len = if current.is_empty() {
            len
        } else {
            current_len + 1 + len
        };
        current.push(sentence);
        fresh += 1;
    }

    if fresh > 0 {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Trailing sentences of a closed chunk to seed the next one with.
fn carry_tail<'a>(sentences: &[&'a str], overlap_hint: usize) -> Vec<&'a str> {
    if overlap_hint == 0 || sentences.len() < 2 {
        return Vec::new();
    }

    let mut taken = 0;
    let mut len = 0;
    for sentence in sentences.iter().rev().take(sentences.len() - 1) {
        let next_len = if taken == 0 {
            sentence.chars().count()
        } else {
            len + 1 + sentence.chars().count()
        };
        if next_len > overlap_hint {
            break;
        }
        len = next_len;
        taken += 1;
    }

    sentences[sentences.len() - taken..].to_vec()
}

fn joined_len(sentences: &[&str]) -> usize {
    let chars: usize = sentences.iter().map(|s| s.chars().count()).sum();
    chars + sentences.len().saturating_sub(1)
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, candidate: &'a str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}
