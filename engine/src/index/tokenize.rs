//! ASCII alphanumeric tokenizer shared by indexing and querying.

/// One occurrence of a token: the byte offset of its first character and
/// its zero-based ordinal among all tokens of the same document/string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordPosition {
    pub char_offset: u64,
    pub word_offset: u64,
}

/// A single emitted token paired with its position.
pub struct Token {
    pub word: String,
    pub position: WordPosition,
}

/// Scans `text` byte-by-byte, emitting maximal runs of ASCII
/// alphanumerics as lowercased tokens. Non-alphanumeric bytes are
/// separators and discarded; empty input yields no tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut char_offset = 0u64;
    let mut word_offset = 0u64;

    for (i, &byte) in bytes.iter().enumerate() {
        if byte.is_ascii_alphanumeric() {
            if current.is_empty() {
                char_offset = i as u64;
            }
            current.push(byte.to_ascii_lowercase() as char);
        } else if !current.is_empty() {
            tokens.push(Token {
                word: std::mem::take(&mut current),
                position: WordPosition {
                    char_offset,
                    word_offset,
                },
            });
            word_offset += 1;
        }
    }

    if !current.is_empty() {
        tokens.push(Token {
            word: current,
            position: WordPosition {
                char_offset,
                word_offset,
            },
        });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn splits_on_non_alphanumeric_and_lowercases() {
        let tokens = tokenize("The Quick-Brown_Fox99!");
        let words: Vec<&str> = tokens.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["the", "quick", "brown", "fox99"]);
    }

    #[test]
    fn char_offsets_point_at_run_start() {
        let tokens = tokenize("  hi there");
        assert_eq!(tokens[0].word, "hi");
        assert_eq!(tokens[0].position.char_offset, 2);
        assert_eq!(tokens[0].position.word_offset, 0);
        assert_eq!(tokens[1].word, "there");
        assert_eq!(tokens[1].position.char_offset, 5);
        assert_eq!(tokens[1].position.word_offset, 1);
    }
}
