/// Default soft limit on chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Characters that end a sentence.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '।', '\n'];

/// A slice of a text run small enough for one provider request.
///
/// Chunks of the same run concatenate back to the run exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its run
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether there is anything to translate.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Greedy sentence packer.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Soft bound on chunk length in characters. A single sentence longer
    /// than this is emitted whole.
    pub max_chars: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl TextChunker {
    pub const fn new(max_chars: usize) -> Self {
        Self {
            max_chars: if max_chars == 0 { 1 } else { max_chars },
        }
    }

    /// Split `text` into chunks at sentence boundaries.
    ///
    /// Returns an empty list for empty or whitespace-only input.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for sentence in split_sentences(text) {
            let len = sentence.chars().count();
            if current_len + len > self.max_chars && !current.is_empty() {
                chunks.push(Chunk {
                    index: chunks.len(),
                    text: std::mem::take(&mut current),
                });
                current_len = 0;
            }
            current.push_str(sentence);
            current_len += len;
        }

        if !current.is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                text: current,
            });
        }

        chunks
    }
}

/// Convenience wrapper over [`TextChunker::chunk`].
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    TextChunker::new(max_chars).chunk(text)
}

/// Split into sentences, each keeping its terminators and the horizontal
/// whitespace that follows them.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !SENTENCE_TERMINATORS.contains(&c) {
            continue;
        }

        // Runs like "?!" or "..." stay together
        while let Some(&(_, next)) = chars.peek() {
            if SENTENCE_TERMINATORS.contains(&next) && next != '\n' && c != '\n' {
                chars.next();
            } else {
                break;
            }
        }
        while let Some(&(_, next)) = chars.peek() {
            if next == ' ' || next == '\t' {
                chars.next();
            } else {
                break;
            }
        }

        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        sentences.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("Hello world. How are you?", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world. How are you?");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   \n\t ", 10).is_empty());
    }

    #[test]
    fn test_splits_at_sentence_boundaries() {
        let text = "One two. Three four! Five six? Seven.";
        let chunks = chunk_text(text, 12);
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["One two. ", "Three four! ", "Five six? ", "Seven."]
        );
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_packs_sentences_greedily() {
        let text = "A. B. C. D.";
        let chunks = chunk_text(text, 6);
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["A. B. ", "C. D."]
        );
    }

    #[test]
    fn test_oversized_sentence_is_kept_whole() {
        let long = "This sentence is far longer than the limit allows.";
        let text = format!("Hi. {long} Bye.");
        let chunks = chunk_text(&text, 10);

        assert_eq!(joined(&chunks), text);
        assert!(chunks.iter().any(|c| c.text.trim() == long));
        for chunk in &chunks {
            if !chunk.text.contains("limit") {
                assert!(chunk.char_count() <= 10);
            }
        }
    }

    #[test]
    fn test_lossless_with_mixed_terminators() {
        let samples = [
            "Wait... what?! No.\nNew line here.\n\nAnd a paragraph",
            "यह एक वाक्य है। यह दूसरा है।",
            "no terminator at all",
            "\n\nleading newlines.  Double  spaces!  ",
            "Décimal 3.14 reste. Fin",
        ];
        for text in samples {
            for size in [1, 5, 17, 1000] {
                let chunks = chunk_text(text, size);
                assert_eq!(joined(&chunks), text, "size {size}");
                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.index, i);
                }
            }
        }
    }

    #[test]
    fn test_bound_counts_characters_not_bytes() {
        // 6 Arabic letters are 12 bytes
        let text = "مرحبا. عالم.";
        let chunks = chunk_text(text, 7);
        assert_eq!(chunks.len(), 2);
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_zero_limit_is_treated_as_one() {
        let chunks = TextChunker::new(0).chunk("A. B.");
        assert_eq!(chunks.len(), 2);
    }
}
