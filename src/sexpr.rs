//! Minimal S-expression reader and writer for KiCad files
//!
//! Atoms keep their exact source text so a tree can be written back without
//! reformatting numbers. Only the metadata kifab needs is ever interpreted.

use std::fmt;

/// An S-expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    /// Unquoted atom (symbol or number), exactly as written
    Atom(String),
    /// Quoted string, unescaped
    Str(String),
    List(Vec<Sexpr>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unclosed list starting at byte {0}")]
    UnclosedList(usize),
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unexpected ')' at byte {0}")]
    UnexpectedClose(usize),
    #[error("trailing content at byte {0}")]
    TrailingContent(usize),
}

impl Sexpr {
    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text of an atom or string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Sexpr::Atom(s) | Sexpr::Str(s) => Some(s),
            Sexpr::List(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Sexpr::Atom(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// First element of a list when it is an atom, e.g. `footprint` in `(footprint ...)`
    pub fn head(&self) -> Option<&str> {
        match self.as_list()?.first()? {
            Sexpr::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// First direct child list named `name`
    pub fn find_list(&self, name: &str) -> Option<&Sexpr> {
        self.as_list()?
            .iter()
            .find(|item| item.head() == Some(name))
    }

    /// All direct child lists named `name`
    pub fn find_all_lists<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Sexpr> + 'a {
        self.as_list()
            .unwrap_or_default()
            .iter()
            .filter(move |item| item.head() == Some(name))
    }

    /// Element at `index` of a list
    pub fn get(&self, index: usize) -> Option<&Sexpr> {
        self.as_list()?.get(index)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Sexpr::Atom(s) => write!(f, "{}", s),
            Sexpr::Str(s) => write!(f, "\"{}\"", escape(s)),
            Sexpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if item.as_list().is_some() {
                        write!(f, "\n{}", "  ".repeat(depth + 1))?;
                    } else if i > 0 {
                        write!(f, " ")?;
                    }
                    item.write_indented(f, depth + 1)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn parse_node(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof),
            Some('(') => self.parse_list(),
            Some(')') => Err(ParseError::UnexpectedClose(self.pos)),
            Some('"') => self.parse_string(),
            Some(_) => Ok(self.parse_atom()),
        }
    }

    fn parse_list(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnclosedList(start)),
                Some(')') => {
                    self.bump();
                    return Ok(Sexpr::List(items));
                }
                Some(_) => items.push(self.parse_node()?),
            }
        }
    }

    fn parse_string(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString(start)),
                Some('"') => return Ok(Sexpr::Str(text)),
                Some('\\') => match self.bump() {
                    None => return Err(ParseError::UnterminatedString(start)),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(ch) => text.push(ch),
                },
                Some(ch) => text.push(ch),
            }
        }
    }

    fn parse_atom(&mut self) -> Sexpr {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }
            self.bump();
        }
        Sexpr::Atom(self.input[start..self.pos].to_string())
    }
}

/// Parse a single top-level S-expression
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    let mut parser = Parser { input, pos: 0 };
    let node = parser.parse_node()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(ParseError::TrailingContent(parser.pos));
    }
    Ok(node)
}
