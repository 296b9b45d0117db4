/*================================================================================
=                            TOKENIZATION                                        =
Turns raw text into the ordered token sequence the signature generators consume.

Analyzers:
  - word: Unicode word segmentation (punctuation and whitespace dropped)
  - char: extended grapheme clusters, whitespace included
  - custom: any `Fn(&str) -> anyhow::Result<Vec<String>>`

Built-in analyzers emit every n-gram with min_n <= n <= max_n. Word n-grams are
joined with a single space. Custom analyzers ignore the n-gram range. When
`lowercase` is set the text is lowercased before any analyzer sees it.
================================================================================*/
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{LshError, Result};

pub type TokenizeFn = dyn Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync;

#[derive(Clone)]
pub enum Analyzer {
    Word,
    Char,
    Custom(Arc<TokenizeFn>),
}

impl Analyzer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync + 'static,
    {
        Analyzer::Custom(Arc::new(f))
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Analyzer::Word => f.write_str("Word"),
            Analyzer::Char => f.write_str("Char"),
            Analyzer::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Analyzer::Word => f.write_str("word"),
            Analyzer::Char => f.write_str("char"),
            Analyzer::Custom(_) => f.write_str("custom"),
        }
    }
}

impl FromStr for Analyzer {
    type Err = LshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "word" => Ok(Analyzer::Word),
            "char" => Ok(Analyzer::Char),
            _ => Err(LshError::UnknownAnalyzer(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    analyzer: Analyzer,
    lowercase: bool,
    ngram_range: (usize, usize),
}

impl Tokenizer {
    pub fn new(analyzer: Analyzer, lowercase: bool, ngram_range: (usize, usize)) -> Result<Self> {
        validate_ngram_range(ngram_range)?;
        Ok(Self {
            analyzer,
            lowercase,
            ngram_range,
        })
    }

    /// Single words, case preserved.
    pub fn word() -> Self {
        Self {
            analyzer: Analyzer::Word,
            lowercase: false,
            ngram_range: (1, 1),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync + 'static,
    {
        Self {
            analyzer: Analyzer::custom(f),
            lowercase: false,
            ngram_range: (1, 1),
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn lowercase(&self) -> bool {
        self.lowercase
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let lowered;
        let text = if self.lowercase {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };

        match &self.analyzer {
            Analyzer::Word => {
                let words: Vec<&str> = text.unicode_words().collect();
                Ok(ngrams(&words, self.ngram_range, " "))
            }
            Analyzer::Char => {
                let chars: Vec<&str> = text.graphemes(true).collect();
                Ok(ngrams(&chars, self.ngram_range, ""))
            }
            Analyzer::Custom(f) => f(text).map_err(|e| LshError::Tokenize {
                index: None,
                message: format!("{:#}", e),
            }),
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::word()
    }
}

pub(crate) fn validate_ngram_range(range: (usize, usize)) -> Result<()> {
    let (min_n, max_n) = range;
    if min_n == 0 || min_n > max_n {
        return Err(LshError::InvalidNgramRange(min_n, max_n));
    }
    Ok(())
}

/// All n-grams of `units` for n in `range`, shortest first.
fn ngrams(units: &[&str], range: (usize, usize), sep: &str) -> Vec<String> {
    let (min_n, max_n) = range;
    if min_n == 1 && max_n == 1 {
        return units.iter().map(|u| u.to_string()).collect();
    }
    let mut out = Vec::new();
    for n in min_n..=max_n {
        if n > units.len() {
            break;
        }
        out.extend(units.windows(n).map(|w| w.join(sep)));
    }
    out
}
