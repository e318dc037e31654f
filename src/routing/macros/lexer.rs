//! Tokenizer for a single `{name:type func(args) else code}` segment.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LBrace,
    RBrace,
    Colon,
    LParen,
    RParen,
    Comma,
    Ident,
    Int,
    Else,
    Illegal,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    /// Byte offset of the first character of the token.
    pub pos: usize,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            input: src.as_bytes(),
            src,
            pos: 0,
        }
    }

    fn peek(&self) -> u8 {
        self.input.get(self.pos).copied().unwrap_or(0)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), b' ' | b'\t' | b'\n' | b'\r') {
            self.pos += 1;
        }
    }

    fn read_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.pos < self.input.len() && pred(self.input[self.pos]) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let pos = self.pos;
        let literal = self.src[pos..pos + 1].to_string();
        self.pos += 1;
        Token { kind, literal, pos }
    }

    /// Returns the next token, skipping leading whitespace.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let pos = self.pos;
        match self.peek() {
            0 => Token {
                kind: TokenKind::Eof,
                literal: String::new(),
                pos,
            },
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b':' => self.single(TokenKind::Colon),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b',' => self.single(TokenKind::Comma),
            c if is_letter(c) => {
                let lit = self.read_while(|c| is_letter(c) || c.is_ascii_digit());
                let kind = if lit == "else" {
                    TokenKind::Else
                } else {
                    TokenKind::Ident
                };
                Token {
                    kind,
                    literal: lit.to_string(),
                    pos,
                }
            }
            c if c.is_ascii_digit() || c == b'-' => {
                self.pos += 1;
                let rest = self.read_while(|c| c.is_ascii_digit());
                let literal = self.src[pos..pos + 1 + rest.len()].to_string();
                Token {
                    kind: TokenKind::Int,
                    literal,
                    pos,
                }
            }
            _ => {
                // keep multi-byte characters intact in the literal
                let ch = self.src[pos..].chars().next().unwrap_or('\0');
                self.pos += ch.len_utf8();
                Token {
                    kind: TokenKind::Illegal,
                    literal: ch.to_string(),
                    pos,
                }
            }
        }
    }

    /// Reads everything up to the `)` that closes the current argument list,
    /// honoring nested parentheses so regular expressions survive intact.
    /// The closing `)` is left for the next call to [`Lexer::next_token`].
    pub fn read_func_arguments(&mut self) -> Option<Token> {
        let pos = self.pos;
        let mut depth = 0usize;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b'\\' => {
                    self.pos += 2;
                    continue;
                }
                b'(' => depth += 1,
                b')' if depth == 0 => {
                    return Some(Token {
                        kind: TokenKind::Ident,
                        literal: self.src[pos..self.pos].to_string(),
                        pos,
                    });
                }
                b')' => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = self.pos.min(self.input.len());
        None
    }
}

fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut l = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = l.next_token();
            let done = t.kind == TokenKind::Eof;
            out.push(t.kind);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn test_tokenizes_full_macro() {
        use TokenKind::*;
        assert_eq!(
            kinds("{id:int min(1) else 400}"),
            vec![LBrace, Ident, Colon, Ident, Ident, LParen, Int, RParen, Else, Int, RBrace, Eof]
        );
    }

    #[test]
    fn test_negative_numbers_are_ints() {
        let mut l = Lexer::new("-15");
        let t = l.next_token();
        assert_eq!(t.kind, TokenKind::Int);
        assert_eq!(t.literal, "-15");
    }

    #[test]
    fn test_func_arguments_keep_nested_parens() {
        let mut l = Lexer::new("^(a|b)[0-9]{1,3}$) else 400");
        let arg = l.read_func_arguments().unwrap();
        assert_eq!(arg.literal, "^(a|b)[0-9]{1,3}$");
        assert_eq!(l.next_token().kind, TokenKind::RParen);
    }

    #[test]
    fn test_unterminated_arguments() {
        let mut l = Lexer::new("abc");
        assert!(l.read_func_arguments().is_none());
        assert_eq!(l.next_token().kind, TokenKind::Eof);
    }
}
