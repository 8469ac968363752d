//! Path expressions addressing nodes of a property tree.
//!
//! Text form: `$` is the root; `name`, `name.name`, `name[0]`,
//! `name["key"]`, `name[key]` and `name[*]` chain arbitrarily. A leading
//! `$` is accepted (`$.name`, `$[0]`) but only printed for the root itself,
//! so `Path::parse(&path.to_string())` reproduces every path whose field
//! names are `[A-Za-z0-9_]+`.

use crate::error::{Result, TamarinError};
use std::fmt;
use std::str::FromStr;

/// Reserved token printed for the root path.
pub const ROOT_TOKEN: &str = "$";

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A record field, or `key`/`value` of a map entry.
    Field(String),
    /// Element, entry or tuple slot by position.
    Index(usize),
    /// Map entries whose key is the given literal.
    Key(String),
    /// Every current element or entry.
    Wildcard,
}

/// Ordered segments from the root; equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn root() -> Self {
        Path::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Path { segments }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Field(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(Segment::Key(key.into()));
        self
    }

    /// Append a wildcard segment.
    pub fn all(mut self) -> Self {
        self.segments.push(Segment::Wildcard);
        self
    }

    /// `self` followed by every segment of `suffix`.
    pub fn join(&self, suffix: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(suffix.segments.iter().cloned());
        Path { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parse(input: &str) -> Result<Path> {
        Parser::new(input).parse()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str(ROOT_TOKEN);
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => {
                    f.write_str("[\"")?;
                    for c in key.chars() {
                        if c == '"' || c == '\\' {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                    f.write_str("\"]")?;
                }
                Segment::Wildcard => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = TamarinError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

/// Anything a manipulation can be addressed with.
pub trait IntoPath {
    fn into_path(self) -> Result<Path>;
}

impl IntoPath for Path {
    fn into_path(self) -> Result<Path> {
        Ok(self)
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Result<Path> {
        Ok(self.clone())
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Result<Path> {
        Path::parse(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Result<Path> {
        Path::parse(&self)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.input.len(), |(offset, _)| *offset)
    }

    fn error(&self, message: impl Into<String>) -> TamarinError {
        TamarinError::PathSyntax {
            input: self.input.to_string(),
            position: self.offset(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, wanted: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected `{wanted}`, found `{c}`")))
            }
            None => Err(self.error(format!("expected `{wanted}`, found end of input"))),
        }
    }

    fn parse(mut self) -> Result<Path> {
        let mut segments = Vec::new();
        if self.peek() == Some('$') {
            self.bump();
            match self.peek() {
                None => return Ok(Path::root()),
                Some('.') => {
                    self.bump();
                    segments.push(Segment::Field(self.name()?));
                }
                Some('[') => {}
                Some(c) => return Err(self.error(format!("unexpected `{c}` after root"))),
            }
        } else if self.peek().is_none() {
            return Ok(Path::root());
        } else if self.peek() != Some('[') {
            segments.push(Segment::Field(self.name()?));
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.bump();
                    segments.push(Segment::Field(self.name()?));
                }
                '[' => {
                    self.bump();
                    segments.push(self.bracket()?);
                }
                other => return Err(self.error(format!("unexpected `{other}`"))),
            }
        }
        Ok(Path { segments })
    }

    fn name(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a field name"));
        }
        Ok(self.chars[start..self.pos].iter().map(|(_, c)| c).collect())
    }

    fn bracket(&mut self) -> Result<Segment> {
        let segment = match self.peek() {
            Some('*') => {
                self.bump();
                Segment::Wildcard
            }
            Some('"') => {
                self.bump();
                Segment::Key(self.quoted()?)
            }
            Some(_) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ']' && c != '[' && c != '"') {
                    self.pos += 1;
                }
                let token: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
                if token.is_empty() {
                    return Err(self.error("empty brackets"));
                }
                if token.chars().all(|c| c.is_ascii_digit()) {
                    let index = token.parse().map_err(|_| {
                        self.error(format!("index `{token}` is out of range"))
                    })?;
                    Segment::Index(index)
                } else {
                    Segment::Key(token)
                }
            }
            None => return Err(self.error("unterminated `[`")),
        };
        self.expect(']')?;
        Ok(segment)
    }

    fn quoted(&mut self) -> Result<String> {
        let mut key = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(key),
                Some('\\') => match self.bump() {
                    Some(c @ ('"' | '\\')) => key.push(c),
                    Some(c) => {
                        self.pos -= 1;
                        return Err(self.error(format!("unknown escape `\\{c}`")));
                    }
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => key.push(c),
                None => return Err(self.error("unterminated string key")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grammar_forms() {
        assert_eq!(Path::parse("$").unwrap(), Path::root());
        assert_eq!(Path::parse("").unwrap(), Path::root());
        assert_eq!(
            Path::parse("order.items[0]").unwrap(),
            Path::root().field("order").field("items").index(0)
        );
        assert_eq!(
            Path::parse("scores[\"a \\\"b\\\"\"][*]").unwrap(),
            Path::root().field("scores").key("a \"b\"").all()
        );
        assert_eq!(
            Path::parse("tags[red]").unwrap(),
            Path::root().field("tags").key("red")
        );
        assert_eq!(Path::parse("$.name").unwrap(), Path::root().field("name"));
        assert_eq!(Path::parse("$[2]").unwrap(), Path::root().index(2));
        assert_eq!(
            Path::parse("[*].key").unwrap(),
            Path::root().all().field("key")
        );
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Path::root().to_string(), "$");
        assert_eq!(Path::root().index(1).index(2).to_string(), "[1][2]");
        assert_eq!(
            Path::root().field("m").key("x\\y").all().field("value").to_string(),
            "m[\"x\\\\y\"][*].value"
        );
    }

    #[test]
    fn test_round_trip_of_mixed_segments() {
        let path = Path::root()
            .field("outer")
            .all()
            .field("value")
            .key("0")
            .index(12)
            .all();
        assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn test_syntax_errors_report_offset() {
        let cases = [
            ("a..b", 2),
            ("a[", 2),
            ("a[1", 3),
            ("a[]", 2),
            ("a[\"x", 4),
            ("a b", 1),
            ("$x", 1),
        ];
        for (input, position) in cases {
            match Path::parse(input) {
                Err(TamarinError::PathSyntax { position: at, .. }) => {
                    assert_eq!(at, position, "offset for {input:?}")
                }
                other => panic!("expected syntax error for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_structural_equality() {
        assert_ne!(
            Path::parse("a[1][2]").unwrap(),
            Path::parse("a[*][*]").unwrap()
        );
        assert_eq!("a.b".parse::<Path>().unwrap(), Path::root().field("a").field("b"));
        assert_eq!(
            Path::root().field("a").join(&Path::root().index(0)),
            Path::root().field("a").index(0)
        );
    }
}
