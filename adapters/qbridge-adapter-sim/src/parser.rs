//! Recursive-descent parser for `.qb` sources.
//!
//! ```text
//! file      := [ "namespace" qname ";" ] operation*
//! operation := [ "@entry" ] "operation" IDENT "{" statement* "}"
//! statement := "measure" INT ";"
//!            | "reset" INT ";"
//!            | "call" qname ";"
//!            | IDENT [ "(" expr { "," expr } ")" ] INT { "," INT } ";"
//! expr      := term { ("+" | "-") term }
//! term      := unary { ("*" | "/") unary }
//! unary     := "-" unary | NUMBER | "pi" | "(" expr ")"
//! ```

use qbridge_proto::Source;

use crate::ast::{
    BinOp, Expression, GateCall, OperationDecl, QualifiedName, SourceFile, Statement,
    StatementKind,
};
use crate::error::{Location, SimError, SimResult};
use crate::lexer::{SpannedToken, Token, tokenize};

/// Parse one source into a syntax tree.
pub fn parse(source: &Source) -> SimResult<SourceFile> {
    let mut parser = Parser::new(source)?;
    parser.parse_file()
}

/// Parser state.
struct Parser<'a> {
    name: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a Source) -> SimResult<Self> {
        let mut tokens = Vec::new();
        for result in tokenize(&source.contents) {
            match result {
                Ok(t) => tokens.push(t),
                Err(e) => {
                    return Err(SimError::Lex {
                        at: Location::new(&source.name, e.line),
                        message: e.message,
                    });
                }
            }
        }
        Ok(Self {
            name: &source.name,
            tokens,
            pos: 0,
        })
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    /// Line of the current token, or of the last one at end of input.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn here(&self) -> Location {
        Location::new(self.name, self.line())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.token.clone();
        self.pos += 1;
        Some(token)
    }

    fn eof(&self, expected: &str) -> SimError {
        SimError::UnexpectedEof {
            file: self.name.to_string(),
            expected: expected.to_string(),
        }
    }

    fn unexpected(&self, at: Location, expected: &str, found: &Token) -> SimError {
        SimError::UnexpectedToken {
            at,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    #[allow(clippy::needless_pass_by_value)]
    fn expect(&mut self, expected: Token) -> SimResult<()> {
        let at = self.here();
        let wanted = format!("'{expected}'");
        let found = self.advance().ok_or_else(|| self.eof(&wanted))?;
        if std::mem::discriminant(&found) != std::mem::discriminant(&expected) {
            return Err(self.unexpected(at, &wanted, &found));
        }
        Ok(())
    }

    fn check(&self, token: &Token) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(token))
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_file(&mut self) -> SimResult<SourceFile> {
        let namespace = if self.consume(&Token::Namespace) {
            let name = self.parse_qualified_name()?;
            self.expect(Token::Semicolon)?;
            Some(name.to_string())
        } else {
            None
        };

        let mut operations = Vec::new();
        while !self.is_eof() {
            operations.push(self.parse_operation()?);
        }

        Ok(SourceFile {
            name: self.name.to_string(),
            namespace,
            operations,
        })
    }

    fn parse_operation(&mut self) -> SimResult<OperationDecl> {
        let is_entry = self.consume(&Token::Entry);
        let line = self.line();
        self.expect(Token::Operation)?;
        let name = self.parse_identifier()?;
        self.expect(Token::LBrace)?;

        let mut body = Vec::new();
        while !self.consume(&Token::RBrace) {
            if self.is_eof() {
                return Err(self.eof("'}'"));
            }
            body.push(self.parse_statement()?);
        }

        Ok(OperationDecl {
            name,
            is_entry,
            line,
            body,
        })
    }

    fn parse_statement(&mut self) -> SimResult<Statement> {
        let line = self.line();
        let at = self.here();
        let token = self.advance().ok_or_else(|| self.eof("statement"))?;

        let kind = match token {
            Token::Measure => StatementKind::Measure(self.parse_qubit()?),
            Token::Reset => StatementKind::Reset(self.parse_qubit()?),
            Token::Call => StatementKind::Call(self.parse_qualified_name()?),
            Token::Identifier(name) => {
                let params = if self.consume(&Token::LParen) {
                    let params = self.parse_expression_list()?;
                    self.expect(Token::RParen)?;
                    params
                } else {
                    Vec::new()
                };
                let mut qubits = vec![self.parse_qubit()?];
                while self.consume(&Token::Comma) {
                    qubits.push(self.parse_qubit()?);
                }
                StatementKind::Gate(GateCall {
                    name,
                    params,
                    qubits,
                })
            }
            other => return Err(self.unexpected(at, "statement", &other)),
        };

        self.expect(Token::Semicolon)?;
        Ok(Statement { kind, line })
    }

    fn parse_qubit(&mut self) -> SimResult<usize> {
        let at = self.here();
        match self.advance() {
            Some(Token::IntLiteral(v)) => usize::try_from(v).map_err(|_| SimError::UnexpectedToken {
                at,
                expected: "qubit index".into(),
                found: v.to_string(),
            }),
            Some(other) => Err(self.unexpected(at, "qubit index", &other)),
            None => Err(self.eof("qubit index")),
        }
    }

    fn parse_identifier(&mut self) -> SimResult<String> {
        let at = self.here();
        match self.advance() {
            Some(Token::Identifier(s)) => Ok(s),
            Some(other) => Err(self.unexpected(at, "identifier", &other)),
            None => Err(self.eof("identifier")),
        }
    }

    fn parse_qualified_name(&mut self) -> SimResult<QualifiedName> {
        let mut parts = vec![self.parse_identifier()?];
        while self.consume(&Token::Dot) {
            parts.push(self.parse_identifier()?);
        }
        let name = parts.pop().unwrap_or_default();
        let namespace = (!parts.is_empty()).then(|| parts.join("."));
        Ok(QualifiedName { namespace, name })
    }

    fn parse_expression_list(&mut self) -> SimResult<Vec<Expression>> {
        if self.check(&Token::RParen) {
            return Ok(vec![]);
        }
        let mut exprs = vec![self.parse_expression()?];
        while self.consume(&Token::Comma) {
            exprs.push(self.parse_expression()?);
        }
        Ok(exprs)
    }

    fn parse_expression(&mut self) -> SimResult<Expression> {
        self.parse_binary_expr(0)
    }

    /// Precedence climbing over `+ - * /`.
    fn parse_binary_expr(&mut self, min_prec: u8) -> SimResult<Expression> {
        let mut left = self.parse_unary_expr()?;

        while let Some(op) = self.peek_binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();

            let right = self.parse_binary_expr(prec + 1)?;
            left = Expression::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn peek_binary_op(&self) -> Option<BinOp> {
        match self.peek()? {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            Token::Star => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            _ => None,
        }
    }

    fn parse_unary_expr(&mut self) -> SimResult<Expression> {
        if self.consume(&Token::Minus) {
            let expr = self.parse_unary_expr()?;
            return Ok(Expression::Neg(Box::new(expr)));
        }
        self.parse_primary_expr()
    }

    #[allow(clippy::cast_precision_loss)]
    fn parse_primary_expr(&mut self) -> SimResult<Expression> {
        let at = self.here();
        match self.advance() {
            Some(Token::IntLiteral(v)) => Ok(Expression::Number(v as f64)),
            Some(Token::FloatLiteral(v)) => Ok(Expression::Number(v)),
            Some(Token::Pi) => Ok(Expression::Pi),
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(other) => Err(self.unexpected(at, "expression", &other)),
            None => Err(self.eof("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn parse_str(text: &str) -> SimResult<SourceFile> {
        parse(&Source::new("test.qb", text))
    }

    #[test]
    fn test_bell() {
        let file = parse_str(
            "namespace Demo.Bells;\n\
             @entry\n\
             operation Bell {\n\
                 h 0;\n\
                 cx 0, 1;\n\
                 measure 0;\n\
                 measure 1;\n\
             }",
        )
        .unwrap();

        assert_eq!(file.namespace.as_deref(), Some("Demo.Bells"));
        assert_eq!(file.operations.len(), 1);
        let op = &file.operations[0];
        assert!(op.is_entry);
        assert_eq!(op.line, 3);
        assert_eq!(op.body.len(), 4);
        assert_eq!(op.body[1].line, 5);
        match &op.body[1].kind {
            StatementKind::Gate(call) => {
                assert_eq!(call.name, "cx");
                assert_eq!(call.qubits, vec![0, 1]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(op.body[3].kind, StatementKind::Measure(1));
    }

    #[test]
    fn test_angle_precedence() {
        let file = parse_str("operation A { rz(-pi / 4 + 1 * 2) 0; }").unwrap();
        let StatementKind::Gate(call) = &file.operations[0].body[0].kind else {
            panic!("expected gate");
        };
        assert!((call.params[0].eval() - (-PI / 4.0 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_parenthesized_angle() {
        let file = parse_str("operation A { ry((1 + 1) * pi) 0; }").unwrap();
        let StatementKind::Gate(call) = &file.operations[0].body[0].kind else {
            panic!("expected gate");
        };
        assert!((call.params[0].eval() - 2.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_call_qualified() {
        let file = parse_str("operation A { call Lib.Prep; reset 2; }").unwrap();
        let body = &file.operations[0].body;
        assert_eq!(
            body[0].kind,
            StatementKind::Call(QualifiedName {
                namespace: Some("Lib".into()),
                name: "Prep".into(),
            })
        );
        assert_eq!(body[1].kind, StatementKind::Reset(2));
    }

    #[test]
    fn test_missing_semicolon_reports_line() {
        let err = parse_str("operation A {\n  h 0\n  x 1;\n}").unwrap_err();
        match err {
            SimError::UnexpectedToken { at, expected, found } => {
                assert_eq!(at.line, 3);
                assert_eq!(expected, "';'");
                assert_eq!(found, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_operation() {
        let err = parse_str("operation A { h 0;").unwrap_err();
        assert!(matches!(err, SimError::UnexpectedEof { .. }));
    }
}
