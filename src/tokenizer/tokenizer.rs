use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// One token produced from a query string
///
/// `position` is the byte offset of the token in the input text; offsets
/// are strictly increasing across the returned sequence. `rank` is the
/// per-occurrence weight the planner folds into `query_rank`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub rank: u32,
    pub position: u32,
}

/// Query tokenizer with optional stemming and stopword removal
///
/// Identical input always produces identical output; the query core relies
/// on this when it re-tokenizes a `LIKE` literal.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let stemmer = if config.stem {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Tokenize text into an ordered sequence of tokens with byte offsets
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let rank = self.config.default_rank.max(1);
        let mut tokens = Vec::new();

        for (offset, word) in text.unicode_word_indices() {
            let mut token = word.to_string();

            if self.config.lowercase {
                token = token.to_lowercase();
            }

            if token.len() < self.config.min_token_length
                || token.len() > self.config.max_token_length
                || self.stopwords.contains(&token)
            {
                continue;
            }

            if let Some(stemmer) = &self.stemmer {
                token = stemmer.stem(&token).to_string();
            }

            tokens.push(Token {
                word: token,
                rank,
                position: offset as u32,
            });
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenizerConfig {
        TokenizerConfig::default()
    }

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::new(&config());
        let tokens = tokenizer.tokenize("Hello World");

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].word, "hello");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].word, "world");
        assert_eq!(tokens[1].position, 6);
    }

    #[test]
    fn test_positions_strictly_increase() {
        let tokenizer = Tokenizer::new(&config());
        let tokens = tokenizer.tokenize("one two three four");

        for pair in tokens.windows(2) {
            assert!(pair[0].position < pair[1].position);
        }
    }

    #[test]
    fn test_deterministic() {
        let tokenizer = Tokenizer::new(&config());
        let a = tokenizer.tokenize("quick brown fox");
        let b = tokenizer.tokenize("quick brown fox");
        assert_eq!(a, b);
    }

    #[test]
    fn test_stopword_removal() {
        let mut cfg = config();
        cfg.remove_stopwords = true;
        let tokenizer = Tokenizer::new(&cfg);
        let tokens = tokenizer.tokenize("the quick fox");

        assert!(tokens.iter().all(|t| t.word != "the"));
        assert!(tokens.iter().any(|t| t.word == "quick"));
    }

    #[test]
    fn test_stemming() {
        let mut cfg = config();
        cfg.stem = true;
        let tokenizer = Tokenizer::new(&cfg);
        let tokens = tokenizer.tokenize("running runs");

        assert!(tokens.iter().all(|t| t.word.starts_with("run")));
    }

    #[test]
    fn test_length_bounds() {
        let mut cfg = config();
        cfg.min_token_length = 3;
        cfg.max_token_length = 5;
        let tokenizer = Tokenizer::new(&cfg);
        let tokens = tokenizer.tokenize("ab abc abcde abcdef");

        let words: Vec<_> = tokens.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, vec!["abc", "abcde"]);
    }

    #[test]
    fn test_rank_clamped_to_one() {
        let mut cfg = config();
        cfg.default_rank = 0;
        let tokenizer = Tokenizer::new(&cfg);
        let tokens = tokenizer.tokenize("word");
        assert_eq!(tokens[0].rank, 1);
    }
}
