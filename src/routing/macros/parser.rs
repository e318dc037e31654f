//! Parses one parameter segment into a [`ParamStatement`].

use super::lexer::{Lexer, Token, TokenKind};
use super::MacroError;

/// Status used when a parameter's type check or one of its functions fails
/// and no `else` code was declared.
pub const DEFAULT_PARAM_ERROR_CODE: u16 = 404;

/// A function call inside a parameter, e.g. `min(1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamFunc {
    pub name: String,
    pub args: Vec<String>,
}

/// The syntax tree of a single `{...}` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamStatement {
    pub src: String,
    pub name: String,
    /// Declared type name as written; `None` when omitted.
    pub type_name: Option<String>,
    pub funcs: Vec<ParamFunc>,
    pub error_code: u16,
}

struct ParamParser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
}

impl<'a> ParamParser<'a> {
    fn syntax(&self, t: &Token, msg: impl Into<String>) -> MacroError {
        MacroError::Syntax {
            src: self.src.to_string(),
            pos: t.pos,
            msg: msg.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, MacroError> {
        let t = self.lexer.next_token();
        if t.kind == kind {
            Ok(t)
        } else {
            Err(self.syntax(&t, format!("expected {} but got {:?}", what, t.literal)))
        }
    }

    fn parse(mut self) -> Result<ParamStatement, MacroError> {
        self.expect(TokenKind::LBrace, "'{'")?;

        let name_tok = self.lexer.next_token();
        if name_tok.kind != TokenKind::Ident {
            return Err(MacroError::MissingName {
                src: self.src.to_string(),
            });
        }

        let mut stmt = ParamStatement {
            src: self.src.to_string(),
            name: name_tok.literal,
            type_name: None,
            funcs: Vec::new(),
            error_code: DEFAULT_PARAM_ERROR_CODE,
        };

        let mut t = self.lexer.next_token();
        if t.kind == TokenKind::Colon {
            let ty = self.expect(TokenKind::Ident, "a parameter type")?;
            stmt.type_name = Some(ty.literal);
            t = self.lexer.next_token();
        }

        loop {
            match t.kind {
                TokenKind::Ident => {
                    let func = self.parse_func(t.literal)?;
                    stmt.funcs.push(func);
                }
                TokenKind::Else => {
                    let code_tok = self.lexer.next_token();
                    stmt.error_code = parse_error_code(self.src, &code_tok)?;
                }
                TokenKind::RBrace => {
                    let rest = self.lexer.next_token();
                    if rest.kind != TokenKind::Eof {
                        return Err(self.syntax(&rest, "unexpected input after '}'"));
                    }
                    return Ok(stmt);
                }
                TokenKind::Eof => return Err(self.syntax(&t, "missing closing '}'")),
                _ => {
                    return Err(self.syntax(&t, format!("unexpected token {:?}", t.literal)));
                }
            }
            t = self.lexer.next_token();
        }
    }

    fn parse_func(&mut self, name: String) -> Result<ParamFunc, MacroError> {
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let raw = match self.lexer.read_func_arguments() {
            Some(t) => t.literal,
            None => {
                return Err(MacroError::InvalidArgs {
                    src: self.src.to_string(),
                    func: name,
                    reason: "missing closing ')'".into(),
                })
            }
        };
        self.expect(TokenKind::RParen, "')'")?;

        let args = if raw.trim().is_empty() {
            Vec::new()
        } else {
            raw.split(',').map(|a| a.trim().to_string()).collect()
        };
        Ok(ParamFunc { name, args })
    }
}

fn parse_error_code(src: &str, t: &Token) -> Result<u16, MacroError> {
    let invalid = || MacroError::InvalidErrorCode {
        src: src.to_string(),
        literal: t.literal.clone(),
    };
    if t.kind != TokenKind::Int {
        return Err(invalid());
    }
    match t.literal.parse::<u16>() {
        Ok(code) if (100..=999).contains(&code) => Ok(code),
        _ => Err(invalid()),
    }
}

/// Parses a `{...}` segment.
pub fn parse_param(src: &str) -> Result<ParamStatement, MacroError> {
    ParamParser {
        src,
        lexer: Lexer::new(src),
    }
    .parse()
}

/// Reports whether a path segment is written in the parameter syntax.
pub fn is_param_segment(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}
