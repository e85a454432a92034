//! Lexer for the marsh pipeline grammar.
//!
//! Converts one input line into a stream of tokens using the logos lexer
//! generator. The grammar is flat: bare words and the six operators
//! `|`, `&`, `;`, `<`, `>`, `>>`. There is no quoting, expansion, or
//! nesting.

use logos::Logos;

use crate::error::KernelError;

/// One token of an input line.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
pub enum Token {
    /// `|` — connects two pipeline stages.
    #[token("|")]
    Pipe,

    /// `&` — terminates a pipeline and marks it background.
    #[token("&")]
    Amp,

    /// `;` — terminates a pipeline.
    #[token(";")]
    Semi,

    /// `>>` — append output redirection. Must be listed before `>` so the
    /// longer operator wins.
    #[token(">>")]
    Append,

    /// `>` — truncating output redirection.
    #[token(">")]
    RedirectOut,

    /// `<` — input redirection.
    #[token("<")]
    RedirectIn,

    /// Any run of characters that is not whitespace or an operator.
    #[regex(r"[^|&;<>\s]+", |lex| lex.slice().to_owned())]
    Word(String),
}

/// Tokenize one input line.
///
/// Any unlexable byte sequence is a syntax error; with this token set that
/// only happens for text the skip pattern and the word regex both reject.
pub fn tokenize(input: &str) -> Result<Vec<Token>, KernelError> {
    Token::lexer(input)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| KernelError::Syntax)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Word(w) => Some(w.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn words_and_operators() {
        let tokens = tokenize("echo hello | tr h H").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("echo".into()),
                Token::Word("hello".into()),
                Token::Pipe,
                Token::Word("tr".into()),
                Token::Word("h".into()),
                Token::Word("H".into()),
            ]
        );
    }

    #[test]
    fn append_wins_over_two_outputs() {
        let tokens = tokenize("lecho x >> out.txt").unwrap();
        assert!(tokens.contains(&Token::Append));
        assert!(!tokens.contains(&Token::RedirectOut));
    }

    #[test]
    fn operators_bind_without_whitespace() {
        let tokens = tokenize("a|b&").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("a".into()),
                Token::Pipe,
                Token::Word("b".into()),
                Token::Amp,
            ]
        );
    }

    #[test]
    fn redirect_targets_are_words() {
        let tokens = tokenize("sort <in.txt >out.txt").unwrap();
        assert_eq!(words(&tokens), vec!["sort", "in.txt", "out.txt"]);
    }

    #[test]
    fn empty_line_has_no_tokens() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   \t ").unwrap().is_empty());
    }
}
