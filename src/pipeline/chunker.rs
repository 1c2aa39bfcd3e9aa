//! Deterministic chunking of extracted text.
//!
//! Sliding window with overlap, preferring sentence and paragraph
//! boundaries over hard cuts. Same text + same parameters always produces
//! the same chunk sequence, byte for byte.

use crate::config::ChunkingConfig;

/// Split text into overlapping chunks.
///
/// Text that fits one window comes back as a single chunk; empty or
/// whitespace-only text produces no chunks at all.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    sliding_window(text, config.max_chars, config.overlap_chars)
        .into_iter()
        .map(|(content, _, _)| content)
        .collect()
}

/// Returns tuples of (chunk_text, start_offset, end_offset).
fn sliding_window(text: &str, max_chars: usize, overlap: usize) -> Vec<(String, usize, usize)> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.len() <= max_chars {
        return vec![(text.to_string(), 0, text.len())];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_chars).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let chunk_end = if end < text.len() {
            find_break_point(&text[start..end])
                .map(|offset| start + offset)
                .unwrap_or(end)
        } else {
            end
        };

        let chunk_text = text[start..chunk_end].trim().to_string();
        if !chunk_text.is_empty() {
            chunks.push((chunk_text, start, chunk_end));
        }

        // Step back by the overlap, unless the chunk was so small that
        // doing so would loop forever.
        let step = chunk_end - start;
        if step <= overlap {
            start = chunk_end;
        } else {
            let mut next = chunk_end - overlap;
            while !text.is_char_boundary(next) {
                next += 1;
            }
            start = next;
        }
    }

    chunks
}

/// Find a break point near the end of the window, preferring paragraph,
/// then sentence, then line, then word boundaries.
fn find_break_point(window: &str) -> Option<usize> {
    let len = window.len();

    if let Some(pos) = window.rfind("\n\n") {
        if pos > len / 3 {
            return Some(pos + 2);
        }
    }

    for pattern in &[". ", "! ", "? ", ".\n", "!\n", "?\n"] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 3 {
                return Some(pos + pattern.len());
            }
        }
    }

    if let Some(pos) = window.rfind('\n') {
        if pos > len / 3 {
            return Some(pos + 1);
        }
    }

    for pattern in &[", ", "; "] {
        if let Some(pos) = window.rfind(pattern) {
            if pos > len / 2 {
                return Some(pos + pattern.len());
            }
        }
    }

    window.rfind(' ').map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("Hello world", &cfg(1000, 100));
        assert_eq!(chunks, vec!["Hello world".to_string()]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("", &cfg(1000, 100)).is_empty());
        assert!(chunk_text("   \n\t ", &cfg(1000, 100)).is_empty());
    }

    #[test]
    fn long_text_is_split_with_overlap() {
        let text = "This is a test sentence. ".repeat(100);
        let chunks = chunk_text(&text, &cfg(200, 50));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 200);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Paragraph one is here.\n\nParagraph two follows it. ".repeat(40);
        let config = cfg(300, 60);
        assert_eq!(chunk_text(&text, &config), chunk_text(&text, &config));
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = format!("{} End of first thought. {}", "a".repeat(150), "b".repeat(150));
        let chunks = chunk_text(&text, &cfg(200, 20));
        assert!(chunks[0].ends_with("End of first thought."));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "héllo wörld grüße ".repeat(100);
        let chunks = chunk_text(&text, &cfg(64, 16));
        assert!(!chunks.is_empty());
    }
}
