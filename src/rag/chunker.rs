use crate::core::config::settings::ChunkingSettings;
use crate::core::errors::ConfigError;

/// A contiguous run of source text. `start_offset` is a character offset
/// into the source it was cut from.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub source: String,
    pub start_offset: usize,
    pub chunk_index: usize,
}

/// Sliding-window splitter. Works on characters, not bytes, so multibyte
/// text never gets cut mid-codepoint.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

/// Break quality, weakest first. Ordering is load-bearing: a stronger
/// break anywhere in the search window beats a weaker one closer to the cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BreakKind {
    Word,
    Sentence,
    Line,
    Paragraph,
}

impl Chunker {
    pub fn new(settings: &ChunkingSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            chunk_size: settings.chunk_size,
            overlap: settings.chunk_overlap,
        })
    }

    /// Split `text` into overlapping chunks of at most `chunk_size`
    /// characters, preferring natural breaks near the size limit. Every
    /// character of the input lands in at least one chunk.
    pub fn split(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let end = if hard_end == chars.len() {
                hard_end
            } else {
                self.find_break(&chars, start, hard_end)
            };

            chunks.push(TextChunk {
                text: chars[start..end].iter().collect(),
                source: source.to_string(),
                start_offset: start,
                chunk_index: chunks.len(),
            });

            if end == chars.len() {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        chunks
    }

    /// Pick a cut position in `(start, hard_end]`. Searches the last fifth
    /// of the window for the strongest break, rightmost among equals, and
    /// falls back to the hard cut when the tail holds no break at all.
    fn find_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let window = hard_end - start;
        let floor = start + (window * 4) / 5;

        let mut best: Option<(BreakKind, usize)> = None;
        for i in (floor..hard_end).rev() {
            if let Some(kind) = classify_break(chars, i) {
                match best {
                    Some((held, _)) if held >= kind => {}
                    _ => best = Some((kind, i + 1)),
                }
                if kind == BreakKind::Paragraph {
                    break;
                }
            }
        }

        best.map(|(_, cut)| cut).unwrap_or(hard_end).max(start + 1)
    }
}

/// Classify the character at `i` as a break point. The cut goes after the
/// character, so separators stay with the chunk they close.
fn classify_break(chars: &[char], i: usize) -> Option<BreakKind> {
    let c = chars[i];
    if c == '\n' {
        if i > 0 && chars[i - 1] == '\n' {
            return Some(BreakKind::Paragraph);
        }
        return Some(BreakKind::Line);
    }
    if matches!(c, '.' | '!' | '?') {
        if chars.get(i + 1).map_or(true, |n| n.is_whitespace()) {
            return Some(BreakKind::Sentence);
        }
        return None;
    }
    if c.is_whitespace() {
        return Some(BreakKind::Word);
    }
    None
}
