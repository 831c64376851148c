//! Splitting one response text across several generated images.

use gemexp_config::render;

/// Characters that end a sentence for split-point snapping.
pub const SENTENCE_TERMINATORS: [char; 6] = ['.', '?', '!', '。', '？', '！'];

/// How far past the ideal split point to look for a terminator.
pub const LOOKAHEAD_CHARS: usize = 50;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Split `text` into exactly `count` segments.
///
/// Paragraphs are grouped when there are at least `count` of them; the last
/// group takes the remainder. With fewer paragraphs the text is cut by
/// character count, snapping each cut to just after a sentence terminator
/// found within [`LOOKAHEAD_CHARS`]. Character cuts are contiguous, so the
/// segments concatenate back to `text`.
pub fn partition(text: &str, count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let paragraphs: Vec<&str> = text.split(PARAGRAPH_SEPARATOR).collect();
    let segments = if paragraphs.len() >= count {
        by_paragraphs(&paragraphs, count)
    } else {
        by_chars(text, count)
    };
    normalize(segments, count)
}

fn by_paragraphs(paragraphs: &[&str], count: usize) -> Vec<String> {
    let per_group = paragraphs.len() / count;
    (0..count)
        .map(|i| {
            let start = i * per_group;
            let end = if i + 1 == count {
                paragraphs.len()
            } else {
                start + per_group
            };
            paragraphs[start..end].join(PARAGRAPH_SEPARATOR)
        })
        .collect()
}

fn by_chars(text: &str, count: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let per_group = total / count;

    let mut segments = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count - 1 {
        let ideal = ((i + 1) * per_group).max(start);
        let limit = (ideal + LOOKAHEAD_CHARS).min(total);
        let end = (ideal..limit)
            .find(|&j| SENTENCE_TERMINATORS.contains(&chars[j]))
            .map_or(ideal, |j| j + 1);
        segments.push(chars[start..end].iter().collect());
        start = end;
    }
    segments.push(chars[start..].iter().collect());
    segments
}

/// Force `segments` to length `count`: pad with empty strings, or fold the
/// surplus tail into the last kept segment joined by blank lines.
pub fn normalize(mut segments: Vec<String>, count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    if segments.len() < count {
        segments.resize(count, String::new());
    } else if segments.len() > count {
        let tail = segments.split_off(count - 1);
        segments.push(tail.join(PARAGRAPH_SEPARATOR));
    }
    segments
}

/// Prefix every segment after the first with `template`, where `{index}` is
/// the 1-based position and `{total}` the segment count.
pub fn label_segments(segments: Vec<String>, template: &str) -> Vec<String> {
    let total = segments.len().to_string();
    segments
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            if i == 0 {
                segment
            } else {
                let index = (i + 1).to_string();
                let label = render(template, &[("index", index.as_str()), ("total", total.as_str())]);
                format!("{label}{segment}")
            }
        })
        .collect()
}
