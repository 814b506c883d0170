//! Lexer for the gate-list language.

use std::ops::Range;

use logos::Logos;

/// Tokens of a `.qb` source file.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // Keywords
    #[token("namespace")]
    Namespace,

    #[token("operation")]
    Operation,

    #[token("@entry")]
    Entry,

    #[token("call")]
    Call,

    #[token("measure")]
    Measure,

    #[token("reset")]
    Reset,

    #[token("pi")]
    Pi,

    // Literals
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLiteral(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u64>().ok())]
    IntLiteral(u64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Operators and punctuation
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Namespace => write!(f, "namespace"),
            Token::Operation => write!(f, "operation"),
            Token::Entry => write!(f, "@entry"),
            Token::Call => write!(f, "call"),
            Token::Measure => write!(f, "measure"),
            Token::Reset => write!(f, "reset"),
            Token::Pi => write!(f, "pi"),
            Token::FloatLiteral(v) => write!(f, "{v}"),
            Token::IntLiteral(v) => write!(f, "{v}"),
            Token::Identifier(s) => write!(f, "{s}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
        }
    }
}

/// A token with its span and 1-based line.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Range<usize>,
    pub line: usize,
}

/// An invalid slice of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub span: Range<usize>,
    pub line: usize,
    pub message: String,
}

/// Tokenize a source string.
pub fn tokenize(source: &str) -> Vec<Result<SpannedToken, LexError>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut scanned = 0;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;

        match result {
            Ok(token) => tokens.push(Ok(SpannedToken { token, span, line })),
            Err(()) => {
                let slice = &source[span.clone()];
                tokens.push(Err(LexError {
                    span,
                    line,
                    message: format!("Invalid token: '{slice}'"),
                }));
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .into_iter()
            .map(|r| r.unwrap().token)
            .collect()
    }

    #[test]
    fn test_operation_header() {
        assert_eq!(
            kinds("@entry operation Bell {"),
            vec![
                Token::Entry,
                Token::Operation,
                Token::Identifier("Bell".into()),
                Token::LBrace,
            ]
        );
    }

    #[test]
    fn test_gate_with_angle() {
        assert_eq!(
            kinds("rx(pi / 2.5) 0;"),
            vec![
                Token::Identifier("rx".into()),
                Token::LParen,
                Token::Pi,
                Token::Slash,
                Token::FloatLiteral(2.5),
                Token::RParen,
                Token::IntLiteral(0),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens: Vec<_> = tokenize("// header\nh 0;\n\n// note\nx 1;")
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[3].line, 5);
    }

    #[test]
    fn test_invalid_token() {
        let results = tokenize("h 0;\n  $");
        let err = results.last().unwrap().as_ref().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains('$'));
    }
}
