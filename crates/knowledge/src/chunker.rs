//! Sentence-aligned text chunking.

/// Split `text` into chunks of whole sentences.
///
/// Newlines become spaces and sentences are split on `". "`. Each sentence is
/// trimmed and terminated with a period if it lacks one. Sentences are packed
/// greedily: a chunk's length (sentences joined by single spaces, counted in
/// characters) stays within `max_size`, except that a single sentence longer
/// than `max_size` forms its own chunk. A sentence is never split.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    let normalized = text.replace('\n', " ");

    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_size = 0usize;

    for candidate in normalized.split(". ") {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            continue;
        }

        let sentence = if trimmed.ends_with('.') {
            trimmed.to_string()
        } else {
            format!("{}.", trimmed)
        };
        let sentence_size = sentence.chars().count();

        let joined_size = if current.is_empty() {
            sentence_size
        } else {
            current_size + 1 + sentence_size
        };

        if joined_size > max_size && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current.push(sentence);
            current_size = sentence_size;
        } else {
            current.push(sentence);
            current_size = joined_size;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences_of(chunks: &[String]) -> Vec<String> {
        chunk_text(&chunks.join(" "), usize::MAX)
            .join(" ")
            .split(". ")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", 500).is_empty());
        assert!(chunk_text("   \n  ", 500).is_empty());
    }

    #[test]
    fn test_single_sentence_gets_period() {
        assert_eq!(chunk_text("Borough: Queens", 500), vec!["Borough: Queens."]);
    }

    #[test]
    fn test_packs_sentences_up_to_max_size() {
        let text = "Alpha beta. Gamma delta. Epsilon zeta. Eta theta";
        let chunks = chunk_text(text, 25);

        assert_eq!(
            chunks,
            vec!["Alpha beta. Gamma delta.", "Epsilon zeta. Eta theta."]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 25));
    }

    #[test]
    fn test_oversized_sentence_stands_alone() {
        let long = "x".repeat(40);
        let text = format!("Short one. {}. Tail", long);
        let chunks = chunk_text(&text, 20);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Short one.");
        assert_eq!(chunks[1], format!("{}.", long));
        assert_eq!(chunks[2], "Tail.");
    }

    #[test]
    fn test_newlines_become_spaces() {
        let chunks = chunk_text("Column: a\nType: int. Next", 500);
        assert_eq!(chunks, vec!["Column: a Type: int. Next."]);
    }

    #[test]
    fn test_sentences_survive_chunking() {
        let text = "One fish. Two fish. Red fish. Blue fish. Black fish. Old fish. New fish";
        for max_size in [1, 10, 20, 35, 500] {
            let chunks = chunk_text(text, max_size);
            assert_eq!(
                sentences_of(&chunks),
                sentences_of(&[text.to_string()]),
                "max_size {}",
                max_size
            );
            for chunk in &chunks {
                let single_sentence = !chunk.trim_end_matches('.').contains(". ");
                assert!(chunk.chars().count() <= max_size || single_sentence);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "A b c. D e f. G h i. J k l";
        assert_eq!(chunk_text(text, 8), chunk_text(text, 8));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let chunks = chunk_text("Café olé. Ünïcödé", 9);
        assert_eq!(chunks, vec!["Café olé.", "Ünïcödé."]);
    }
}
