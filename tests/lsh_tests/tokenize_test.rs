extern crate lshdedup;
use lshdedup::{Analyzer, LshError, Tokenizer};

#[test]
fn test_word_analyzer_drops_punctuation() {
    let tokenizer = Tokenizer::new(Analyzer::Word, false, (1, 1)).unwrap();
    let tokens = tokenizer.tokenize("Is this the first document?").unwrap();
    assert_eq!(tokens, vec!["Is", "this", "the", "first", "document"]);
}

#[test]
fn test_lowercase_applies_before_analysis() {
    let tokenizer = Tokenizer::new(Analyzer::Word, true, (2, 2)).unwrap();
    let tokens = tokenizer.tokenize("The Quick Brown").unwrap();
    assert_eq!(tokens, vec!["the quick", "quick brown"]);
}

#[test]
fn test_char_analyzer_keeps_whitespace() {
    let tokenizer = Tokenizer::new(Analyzer::Char, false, (3, 3)).unwrap();
    let tokens = tokenizer.tokenize("ab cd").unwrap();
    assert_eq!(tokens, vec!["ab ", "b c", " cd"]);
}

#[test]
fn test_short_text_yields_no_ngrams() {
    let tokenizer = Tokenizer::new(Analyzer::Word, false, (3, 4)).unwrap();
    assert!(tokenizer.tokenize("two words").unwrap().is_empty());
    assert!(tokenizer.tokenize("").unwrap().is_empty());
}

#[test]
fn test_custom_analyzer_ignores_ngram_range() {
    let analyzer = Analyzer::custom(|text| Ok(text.split('|').map(String::from).collect()));
    let tokenizer = Tokenizer::new(analyzer, true, (2, 3)).unwrap();
    assert_eq!(tokenizer.tokenize("A|B|C").unwrap(), vec!["a", "b", "c"]);
    assert_eq!(tokenizer.analyzer().to_string(), "custom");
}

#[test]
fn test_custom_analyzer_error() {
    let tokenizer = Tokenizer::from_fn(|_| Err(anyhow::anyhow!("no tokens for you")));
    let err = tokenizer.tokenize("anything").unwrap_err();
    assert!(matches!(err, LshError::Tokenize { index: None, .. }));
    assert!(err.to_string().contains("no tokens for you"));
}
