use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token at line {line}: {message}")]
    UnexpectedToken { line: usize, message: String },
    #[error("Trailing input at line {0}")]
    TrailingInput(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Symbol at the head of a list, e.g. `comp` for `(comp (ref "R1"))`.
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_atom()
    }

    pub fn is(&self, key: &str) -> bool {
        self.head() == Some(key)
    }

    /// Child lists whose head is `key`.
    pub fn children<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a SExp> + 'a {
        self.as_list()
            .unwrap_or(&[])
            .iter()
            .filter(move |item| item.is(key))
    }

    /// First child list whose head is `key`.
    pub fn child(&self, key: &str) -> Option<&SExp> {
        self.as_list()?.iter().find(|item| item.is(key))
    }

    /// Atom following the head of the first `key` child: `(ref "R1")` gives `R1`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.child(key)?.as_list()?.get(1)?.as_atom()
    }

    /// Like [`SExp::value`] but defaults to an empty string.
    pub fn value_or_empty(&self, key: &str) -> String {
        self.value(key).unwrap_or_default().to_string()
    }

    /// Atom at `index` in this list: `(property "Value" "10k")` gives
    /// `Value` at 1 and `10k` at 2.
    pub fn atom_at(&self, index: usize) -> Option<&str> {
        self.as_list()?.get(index)?.as_atom()
    }

    /// Last atom of this list, used for `(field (name "MPN") "GRM155")`.
    pub fn last_atom(&self) -> Option<&str> {
        let items = self.as_list()?;
        if items.len() < 2 {
            return None;
        }
        items.last()?.as_atom()
    }
}

/// Reader for the S-expression files KiCad writes (netlists, schematics).
pub struct SExpParser<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> SExpParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    /// Parse exactly one top-level expression; anything but whitespace after it
    /// is an error.
    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        if self.is_eof() {
            return Err(ParseError::UnexpectedEof);
        }
        let sexp = self.parse_sexp()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(ParseError::TrailingInput(self.line));
        }
        Ok(sexp)
    }

    fn parse_sexp(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof),
            Some('(') => self.parse_list(),
            Some(')') => Err(self.unexpected("unbalanced ')'")),
            Some('"') => self.parse_string(),
            Some(_) => self.parse_symbol(),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, ParseError> {
        self.advance();
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof),
                Some(')') => {
                    self.advance();
                    return Ok(SExp::List(items));
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }
    }

    fn parse_string(&mut self) -> Result<SExp, ParseError> {
        self.advance();
        let mut s = String::new();

        loop {
            let ch = self.peek().ok_or(ParseError::UnexpectedEof)?;
            self.advance();
            match ch {
                '"' => return Ok(SExp::Atom(s)),
                '\\' => {
                    let escaped = self.peek().ok_or(ParseError::UnexpectedEof)?;
                    self.advance();
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                other => s.push(other),
            }
        }
    }

    fn parse_symbol(&mut self) -> Result<SExp, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }
            self.advance();
        }
        Ok(SExp::Atom(self.input[start..self.pos].to_string()))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            if ch == '\n' {
                self.line += 1;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn unexpected(&self, message: &str) -> ParseError {
        ParseError::UnexpectedToken {
            line: self.line,
            message: message.to_string(),
        }
    }
}

/// Parse a complete S-expression document.
pub fn parse(input: &str) -> Result<SExp, ParseError> {
    SExpParser::new(input).parse()
}
