// Source line tokens for naming debug variables. The tracing code's source file is scanned
// once per path: a line that starts a `let` binding yields the bound identifier, a line
// that returns a traced value (a `return` statement or a `.ret(` call) yields a return
// token. Unreadable files produce no tokens, so variables on their lines stay unnamed.

use hashbrown::HashMap;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Identifier(String),
    Return,
}

/// Tokens of one file by 1-based line number.
pub type LineTokens = HashMap<u32, Token>;

fn binding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*let\s+(?:mut\s+)?([A-Za-z_]\w*)\s*(?::[^=]+)?=").unwrap_or_else(|e| panic!("binding pattern: {e}"))
    })
}

fn return_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:return\b|[\w.]*\.ret\()").unwrap_or_else(|e| panic!("return pattern: {e}"))
    })
}

pub fn parse_tokens(source: &str) -> LineTokens {
    let mut tokens = LineTokens::new();
    for (index, line) in source.lines().enumerate() {
        let number = index as u32 + 1;
        if return_pattern().is_match(line) {
            tokens.insert(number, Token::Return);
        } else if let Some(captures) = binding_pattern().captures(line) {
            if &captures[1] != "_" {
                tokens.insert(number, Token::Identifier(captures[1].to_string()));
            }
        }
    }
    tokens
}

/// Per-path token cache.
#[derive(Debug, Default)]
pub struct TokenCache {
    files: HashMap<String, LineTokens>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, file: &str, line: u32) -> Option<&Token> {
        self.tokens(file).get(&line)
    }

    pub fn tokens(&mut self, file: &str) -> &LineTokens {
        self.files.entry_ref(file).or_insert_with(|| match std::fs::read_to_string(file) {
            Ok(source) => parse_tokens(&source),
            Err(e) => {
                log::warn!("no debug tokens for {}: {}", file, e);
                LineTokens::new()
            }
        })
    }

    /// Install tokens for `file` without reading it.
    pub fn insert(&mut self, file: &str, tokens: LineTokens) {
        self.files.insert(file.to_string(), tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_and_returns() {
        let source = "\
fn trace(f: &Session) {
    let x = f.arg::<Int>(0).rvalue();
    let mut total: Int = 0;
    let _ = x;
    f.ret(x + 1);
    return;
}";
        let tokens = parse_tokens(source);
        assert_eq!(tokens.get(&2), Some(&Token::Identifier("x".into())));
        assert_eq!(tokens.get(&3), Some(&Token::Identifier("total".into())));
        assert_eq!(tokens.get(&4), None);
        assert_eq!(tokens.get(&5), Some(&Token::Return));
        assert_eq!(tokens.get(&6), Some(&Token::Return));
        assert_eq!(tokens.get(&1), None);
    }

    #[test]
    fn test_missing_file_has_no_tokens() {
        let mut cache = TokenCache::new();
        assert!(cache.lookup("/nonexistent/reactor/source.rs", 1).is_none());
    }
}
