//! Text VDF (Valve KeyValues) parser.
//!
//! Decodes the nested `"key" "value"` / `"key" { ... }` format used by
//! `appmanifest_*.acf` and `libraryfolders.vdf`. Keys are case-folded when
//! read, and every lookup on [`Table`] folds the query key the same way.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use crate::SteamError;

/// A 1-based line/column location in the parsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Malformed VDF input.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("duplicate key '{key}' at {position}")]
    DuplicateKey { key: String, position: Position },

    #[error("unexpected end of input at {position}")]
    UnexpectedEof { position: Position },

    #[error("unexpected '{found}' at {position}")]
    UnexpectedToken { found: char, position: Position },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed node: either a string attribute or a nested table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Attribute(String),
    Table(Table),
}

impl Value {
    /// Returns the attribute string, or `None` for a table.
    pub fn as_attribute(&self) -> Option<&str> {
        match self {
            Value::Attribute(s) => Some(s),
            Value::Table(_) => None,
        }
    }

    /// Returns the nested table, or `None` for an attribute.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Attribute(_) => None,
            Value::Table(t) => Some(t),
        }
    }
}

/// An ordered collection of uniquely-keyed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    entries: Vec<(String, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entry by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = canonical_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Looks up a string attribute. Tables under `key` are not returned.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_attribute)
    }

    /// Looks up a nested table. Attributes under `key` are not returned.
    pub fn table(&self, key: &str) -> Option<&Table> {
        self.get(key).and_then(Value::as_table)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts an entry under the canonical form of `key`.
    ///
    /// Returns `false` and leaves the table untouched if the key is already
    /// present.
    pub fn insert(&mut self, key: &str, value: Value) -> bool {
        self.insert_canonical(canonical_key(key), value)
    }

    fn insert_canonical(&mut self, key: String, value: Value) -> bool {
        if self.entries.iter().any(|(k, _)| *k == key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Returns the canonical (case-folded) form of a key.
pub fn canonical_key(key: &str) -> String {
    key.to_lowercase()
}

/// Parses a VDF document held in memory.
pub fn parse_str(input: &str) -> Result<Table, FormatError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    Parser::new(input).parse_document()
}

/// Reads `reader` to the end and parses it as a VDF document.
pub fn parse_reader<R: Read>(mut reader: R) -> Result<Table, FormatError> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;
    parse_str(&input)
}

/// Opens and parses a VDF file.
pub fn load_file(path: &Path) -> Result<Table, SteamError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SteamError::FileNotFound(path.to_path_buf())
        } else {
            SteamError::Io(format!("failed to open {}: {e}", path.display()))
        }
    })?;
    Ok(parse_reader(BufReader::new(file))?)
}

/// Maps the character after a backslash to its decoded form.
fn unescape(c: char) -> Option<char> {
    match c {
        'r' => Some('\r'),
        'n' => Some('\n'),
        't' => Some('\t'),
        '\'' => Some('\''),
        '"' => Some('"'),
        '\\' => Some('\\'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'v' => Some('\u{b}'),
        _ => None,
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Discards everything up to and including the next newline.
    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Skips whitespace and comment lines between items.
    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if self.peek() == Some('/') {
                self.skip_line();
            } else {
                break;
            }
        }
    }

    fn parse_document(mut self) -> Result<Table, FormatError> {
        self.skip_trivia();

        // `{ ... }` around the whole document is the root table itself.
        if self.peek() == Some('{') {
            self.bump();
            let root = self.parse_table_body()?;
            self.skip_trivia();
            if let Some(found) = self.peek() {
                return Err(FormatError::UnexpectedToken {
                    found,
                    position: self.position(),
                });
            }
            return Ok(root);
        }

        let mut root = Table::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Ok(root),
                Some(found @ ('{' | '}')) => {
                    return Err(FormatError::UnexpectedToken {
                        found,
                        position: self.position(),
                    });
                }
                Some(_) => self.parse_item(&mut root)?,
            }
        }
    }

    /// Parses items up to the closing brace; the opening brace is consumed.
    fn parse_table_body(&mut self) -> Result<Table, FormatError> {
        let mut table = Table::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    return Err(FormatError::UnexpectedEof {
                        position: self.position(),
                    });
                }
                Some('}') => {
                    self.bump();
                    return Ok(table);
                }
                Some('{') => {
                    return Err(FormatError::UnexpectedToken {
                        found: '{',
                        position: self.position(),
                    });
                }
                Some(_) => self.parse_item(&mut table)?,
            }
        }
    }

    fn parse_item(&mut self, table: &mut Table) -> Result<(), FormatError> {
        let position = self.position();
        let key = canonical_key(&self.read_string()?);

        let Some(value) = self.parse_value()? else {
            return Ok(());
        };

        if !table.insert_canonical(key.clone(), value) {
            return Err(FormatError::DuplicateKey { key, position });
        }
        Ok(())
    }

    /// Parses the value after a key. A comment yields `None`.
    fn parse_value(&mut self) -> Result<Option<Value>, FormatError> {
        self.skip_whitespace();
        let position = self.position();

        match self.peek() {
            None => Err(FormatError::UnexpectedEof { position }),
            Some('/') => {
                self.skip_line();
                Ok(None)
            }
            Some('{') => {
                self.bump();
                Ok(Some(Value::Table(self.parse_table_body()?)))
            }
            Some('}') => Err(FormatError::UnexpectedToken {
                found: '}',
                position,
            }),
            Some(_) => Ok(Some(Value::Attribute(self.read_string()?))),
        }
    }

    /// Reads a quoted string or a whitespace-terminated bareword.
    fn read_string(&mut self) -> Result<String, FormatError> {
        let quoted = self.peek() == Some('"');
        if quoted {
            self.bump();
        }

        let mut out = String::new();
        loop {
            let position = self.position();
            let Some(c) = self.bump() else {
                if quoted {
                    return Err(FormatError::UnexpectedEof { position });
                }
                break;
            };

            if (quoted && c == '"') || (!quoted && c.is_whitespace()) {
                break;
            }

            if c == '\\' {
                match self.bump() {
                    // Unknown escapes are dropped entirely.
                    Some(escaped) => out.extend(unescape(escaped)),
                    None if quoted => {
                        return Err(FormatError::UnexpectedEof {
                            position: self.position(),
                        });
                    }
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_braced_root_with_subtable() {
        let root = parse_str(r#"{"a" "1" "b" {"c" "2"}}"#).unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root.attribute("a"), Some("1"));
        let b = root.table("b").unwrap();
        assert_eq!(b.attribute("c"), Some("2"));
    }

    #[test]
    fn keys_are_case_folded() {
        let root = parse_str(r#""AppID" "440""#).unwrap();
        assert_eq!(root.attribute("appid"), Some("440"));
        assert_eq!(root.attribute("APPID"), Some("440"));
        assert_eq!(root.iter().next().unwrap().0, "appid");
    }

    #[test]
    fn values_keep_their_case() {
        let root = parse_str(r#""name" "Team Fortress 2""#).unwrap();
        assert_eq!(root.attribute("name"), Some("Team Fortress 2"));
    }

    #[test]
    fn escapes_are_decoded() {
        let root = parse_str(r#""s" "line1\nline2\t\"end\"""#).unwrap();
        assert_eq!(root.attribute("s"), Some("line1\nline2\t\"end\""));
    }

    #[test]
    fn all_known_escapes() {
        let root = parse_str(r#""s" "\r\n\t\'\"\\\b\f\v""#).unwrap();
        assert_eq!(
            root.attribute("s"),
            Some("\r\n\t'\"\\\u{8}\u{c}\u{b}")
        );
    }

    #[test]
    fn unknown_escape_is_dropped() {
        let root = parse_str(r#""s" "a\qb""#).unwrap();
        assert_eq!(root.attribute("s"), Some("ab"));
    }

    #[test]
    fn windows_paths_unescape() {
        let root = parse_str(r#""path" "D:\\SteamLibrary""#).unwrap();
        assert_eq!(root.attribute("path"), Some(r"D:\SteamLibrary"));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let err = parse_str(r#"{"a" "1" "a" "2"}"#).unwrap_err();
        match err {
            FormatError::DuplicateKey { key, position } => {
                assert_eq!(key, "a");
                assert_eq!(position, Position { line: 1, column: 10 });
            }
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_key_differing_only_in_case() {
        let err = parse_str("\"Name\" \"x\"\n\"NAME\" \"y\"").unwrap_err();
        assert!(matches!(err, FormatError::DuplicateKey { ref key, .. } if key == "name"));
    }

    #[test]
    fn duplicate_between_attribute_and_table() {
        let err = parse_str(r#""a" "1" "a" { "b" "2" }"#).unwrap_err();
        assert!(matches!(err, FormatError::DuplicateKey { .. }));
    }

    #[test]
    fn same_key_in_different_tables_is_fine() {
        let root = parse_str(r#""x" { "a" "1" } "y" { "a" "2" }"#).unwrap();
        assert_eq!(root.table("x").unwrap().attribute("a"), Some("1"));
        assert_eq!(root.table("y").unwrap().attribute("a"), Some("2"));
    }

    #[test]
    fn comment_line_is_skipped() {
        let root = parse_str("\"a\" \"1\" // comment text\n \"b\" \"2\"").unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root.attribute("a"), Some("1"));
        assert_eq!(root.attribute("b"), Some("2"));
    }

    #[test]
    fn single_slash_starts_a_comment() {
        let root = parse_str("/ not really a comment \"x\" \"y\"\n\"b\" \"2\"").unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root.attribute("b"), Some("2"));
    }

    #[test]
    fn comment_in_value_position_drops_the_key() {
        let root = parse_str("\"a\" // gone\n\"b\" \"2\"").unwrap();
        assert!(!root.contains_key("a"));
        assert_eq!(root.attribute("b"), Some("2"));
    }

    #[test]
    fn barewords() {
        let root = parse_str("key value\nother\t{ inner 3 }").unwrap();
        assert_eq!(root.attribute("key"), Some("value"));
        assert_eq!(root.table("other").unwrap().attribute("inner"), Some("3"));
    }

    #[test]
    fn bareword_at_end_of_input() {
        let root = parse_str("key value").unwrap();
        assert_eq!(root.attribute("key"), Some("value"));
    }

    #[test]
    fn empty_document() {
        assert!(parse_str("").unwrap().is_empty());
        assert!(parse_str("  \n\t// only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn empty_table() {
        let root = parse_str(r#""a" {}"#).unwrap();
        assert!(root.table("a").unwrap().is_empty());
    }

    #[test]
    fn unterminated_table() {
        let err = parse_str("\"a\"\n{\n\"b\" \"1\"\n").unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { position } if position.line == 4));
    }

    #[test]
    fn unterminated_quoted_string() {
        let err = parse_str(r#""a" "never closed"#).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));
    }

    #[test]
    fn key_without_value() {
        let err = parse_str(r#""a" "1" "b""#).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));
    }

    #[test]
    fn table_in_key_position_is_rejected() {
        let err = parse_str(r#""a" { { "b" "1" } }"#).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedToken { found: '{', .. }));
    }

    #[test]
    fn stray_closing_brace_at_root() {
        let err = parse_str(r#""a" "1" }"#).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedToken { found: '}', .. }));
    }

    #[test]
    fn trailing_content_after_braced_root() {
        let err = parse_str(r#"{"a" "1"} "b" "2""#).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedToken { found: '"', .. }));
    }

    #[test]
    fn entries_keep_document_order() {
        let root = parse_str(r#""z" "1" "a" "2" "m" "3""#).unwrap();
        let keys: Vec<&str> = root.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let root = parse_str("\u{feff}\"a\" \"1\"").unwrap();
        assert_eq!(root.attribute("a"), Some("1"));
    }

    #[test]
    fn parse_from_reader() {
        let input = b"\"appstate\" { \"appid\" \"730\" }".as_slice();
        let root = parse_reader(input).unwrap();
        assert_eq!(root.table("appstate").unwrap().attribute("appid"), Some("730"));
    }

    #[test]
    fn load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing.vdf");
        assert!(matches!(load_file(&path), Err(SteamError::FileNotFound(p)) if p == path));
    }

    #[test]
    fn table_insert_rejects_duplicates() {
        let mut table = Table::new();
        assert!(table.insert("Key", Value::Attribute("1".into())));
        assert!(!table.insert("KEY", Value::Attribute("2".into())));
        assert_eq!(table.attribute("key"), Some("1"));
    }
}
