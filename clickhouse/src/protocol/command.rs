//! Statement classification by leading keyword.
//!
//! The command decides the request path: inserts carry a RowBinary body and
//! return a written-row count, row-returning statements get a binary output
//! format, everything else is passed through.

use std::fmt;

use bytes::{Bytes, BytesMut};

/// Kind of SQL statement, from its first keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Select,
    Insert,
    Create,
    Alter,
    Delete,
    System,
    Show,
    Grant,
    Explain,
    Revoke,
    Attach,
    Check,
    Describe,
    Detach,
    Drop,
    Exists,
    Kill,
    Optimize,
    Rename,
    Exchange,
    Set,
    Truncate,
    Use,
    Watch,
    /// Not classified (e.g. multi-statement scripts). Not an error.
    None,
}

/// Leading keywords, lowercase.
const KEYWORDS: &[(&str, Command)] = &[
    ("select", Command::Select),
    ("with", Command::Select),
    ("insert", Command::Insert),
    ("create", Command::Create),
    ("alter", Command::Alter),
    ("delete", Command::Delete),
    ("system", Command::System),
    ("show", Command::Show),
    ("grant", Command::Grant),
    ("explain", Command::Explain),
    ("revoke", Command::Revoke),
    ("attach", Command::Attach),
    ("check", Command::Check),
    ("describe", Command::Describe),
    ("desc", Command::Describe),
    ("detach", Command::Detach),
    ("drop", Command::Drop),
    ("exists", Command::Exists),
    ("kill", Command::Kill),
    ("optimize", Command::Optimize),
    ("rename", Command::Rename),
    ("exchange", Command::Exchange),
    ("set", Command::Set),
    ("truncate", Command::Truncate),
    ("use", Command::Use),
    ("watch", Command::Watch),
];

/// Length of the longest entry in `KEYWORDS`.
pub const MAX_KEYWORD_LEN: usize = 8;

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Select => "select",
            Command::Insert => "insert",
            Command::Create => "create",
            Command::Alter => "alter",
            Command::Delete => "delete",
            Command::System => "system",
            Command::Show => "show",
            Command::Grant => "grant",
            Command::Explain => "explain",
            Command::Revoke => "revoke",
            Command::Attach => "attach",
            Command::Check => "check",
            Command::Describe => "describe",
            Command::Detach => "detach",
            Command::Drop => "drop",
            Command::Exists => "exists",
            Command::Kill => "kill",
            Command::Optimize => "optimize",
            Command::Rename => "rename",
            Command::Exchange => "exchange",
            Command::Set => "set",
            Command::Truncate => "truncate",
            Command::Use => "use",
            Command::Watch => "watch",
            Command::None => "none",
        }
    }

    pub fn is_insert(self) -> bool {
        self == Command::Insert
    }

    /// Statements whose response is a result set.
    pub fn returns_rows(self) -> bool {
        matches!(
            self,
            Command::Select
                | Command::Show
                | Command::Describe
                | Command::Exists
                | Command::Explain
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn trim_start(sql: &[u8]) -> &[u8] {
    let start = sql
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .unwrap_or(sql.len());
    &sql[start..]
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Classify a statement by its leading keyword (longest match, any case).
pub fn classify(sql: &[u8]) -> Command {
    let sql = trim_start(sql);
    KEYWORDS
        .iter()
        .filter(|(kw, _)| {
            sql.len() >= kw.len()
                && sql[..kw.len()].eq_ignore_ascii_case(kw.as_bytes())
                && sql.get(kw.len()).is_none_or(|b| !is_word_byte(*b))
        })
        .max_by_key(|(kw, _)| kw.len())
        .map(|(_, cmd)| *cmd)
        .unwrap_or(Command::None)
}

/// Classify a statement given as chunks. The first chunk is used alone when
/// it holds more than any keyword; otherwise chunks are joined until the
/// keyword and its boundary are visible.
pub fn classify_chunks<C: AsRef<[u8]>>(chunks: &[C]) -> Command {
    let Some(first) = chunks.first() else {
        return Command::None;
    };
    if trim_start(first.as_ref()).len() > MAX_KEYWORD_LEN {
        return classify(first.as_ref());
    }
    let mut joined = Vec::new();
    for chunk in chunks {
        joined.extend_from_slice(chunk.as_ref());
        if trim_start(&joined).len() > MAX_KEYWORD_LEN {
            break;
        }
    }
    classify(&joined)
}

/// A statement and its command kind, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    chunks: Vec<Bytes>,
    command: Command,
}

impl Query {
    pub fn new(sql: impl Into<Bytes>) -> Self {
        Self::from_chunks(vec![sql.into()])
    }

    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        let command = classify_chunks(&chunks);
        Self { chunks, command }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Total statement length in bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the statement text to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
    }

    /// Contiguous statement text. Free for single-chunk queries.
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.as_slice() {
            [single] => single.clone(),
            _ => {
                let mut buf = BytesMut::with_capacity(self.len());
                self.write_to(&mut buf);
                buf.freeze()
            }
        }
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::new(Bytes::copy_from_slice(sql.as_bytes()))
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::new(sql)
    }
}

impl From<&String> for Query {
    fn from(sql: &String) -> Self {
        Query::from(sql.as_str())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.chunks {
            f.write_str(&String::from_utf8_lossy(chunk))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_bound() {
        let longest = KEYWORDS.iter().map(|(kw, _)| kw.len()).max();
        assert_eq!(longest, Some(MAX_KEYWORD_LEN));
    }

    #[test]
    fn test_classify_table() {
        for (sql, expected) in [
            ("select 1", Command::Select),
            ("  INSERT INTO t VALUES", Command::Insert),
            ("with x as (select 1) select * from x", Command::Select),
            ("garbage", Command::None),
            ("SeLeCt", Command::Select),
            ("\n\tdrop table t", Command::Drop),
            ("DESC t", Command::Describe),
            ("describe table t", Command::Describe),
            ("exists table t", Command::Exists),
            ("selection", Command::None),
            ("select(1)", Command::Select),
            ("", Command::None),
            ("   ", Command::None),
            ("SYSTEM FLUSH LOGS", Command::System),
            ("exchange tables a and b", Command::Exchange),
        ] {
            assert_eq!(classify(sql.as_bytes()), expected, "{:?}", sql);
        }
    }

    #[test]
    fn test_classify_chunks_spanning_keyword() {
        assert_eq!(classify_chunks(&["  sel", "ect 1"]), Command::Select);
        assert_eq!(classify_chunks(&["in", "se", "rt into t"]), Command::Insert);
        assert_eq!(classify_chunks(&["desc", "ribe t"]), Command::Describe);
        assert_eq!(classify_chunks(&["   ", "\n", "show tables"]), Command::Show);
        assert_eq!(classify_chunks(&["optimize table t"]), Command::Optimize);
        assert_eq!(classify_chunks::<&str>(&[]), Command::None);
    }

    #[test]
    fn test_query_fixed_at_construction() {
        let q = Query::from_chunks(vec![Bytes::from_static(b"INS"), Bytes::from_static(b"ERT INTO t")]);
        assert_eq!(q.command(), Command::Insert);
        assert_eq!(q.len(), 13);
        assert_eq!(&q.to_bytes()[..], b"INSERT INTO t");
        assert_eq!(q.to_string(), "INSERT INTO t");

        let q = Query::from("SHOW TABLES");
        assert!(q.command().returns_rows());
        assert!(!q.command().is_insert());
    }
}
