use serde::{Deserialize, Serialize};

/// Search execution configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Bound for top-K selection; the radix selector retains roughly this
    /// many best candidates
    pub top: usize,
    /// Admission threshold for the one-word optimisation and the mirror
    /// pre-filter size when the caller gave no `end` position
    pub min_result_count: usize,
    pub tokenizer: TokenizerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top: 1000,
            min_result_count: 100,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Set the top-K bound
    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }

    /// Set the minimum result count threshold
    pub fn with_min_result_count(mut self, count: usize) -> Self {
        self.min_result_count = count;
        self
    }

    /// Set the tokenizer configuration
    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }
}

/// Tokenizer configuration
///
/// Stemming and stopword removal default to off: query tokens must line up
/// with what the mirror `LIKE` predicate will later confirm verbatim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    pub language: String,
    /// Rank assigned to every produced token; callers with weighted
    /// tokenizers supply their own ranks instead
    pub default_rank: u32,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: 50,
            language: "english".to_string(),
            default_rank: 1,
        }
    }
}
