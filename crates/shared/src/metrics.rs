//! Word and character counts derived from raw text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub words: usize,
    pub chars: usize,
}

/// Counts every character of `text` (whitespace included, nothing trimmed)
/// and every maximal run of non-whitespace characters.
pub fn measure(text: &str) -> TextStats {
    TextStats {
        words: text.split_whitespace().count(),
        chars: text.chars().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_words_or_chars() {
        assert_eq!(measure(""), TextStats { words: 0, chars: 0 });
    }

    #[test]
    fn whitespace_only_counts_chars_but_no_words() {
        assert_eq!(measure("   "), TextStats { words: 0, chars: 3 });
        assert_eq!(measure("\t\n "), TextStats { words: 0, chars: 3 });
    }

    #[test]
    fn internal_whitespace_collapses_between_words() {
        assert_eq!(measure(" a  b "), TextStats { words: 2, chars: 6 });
        assert_eq!(
            measure("The feline was seated."),
            TextStats { words: 4, chars: 22 }
        );
    }

    #[test]
    fn chars_are_unicode_scalars_not_bytes() {
        let stats = measure("café ☕");
        assert_eq!(stats.chars, 6);
        assert_eq!(stats.words, 2);
    }
}
