//! Error type shared by the reader and writer.

use core::fmt;
use std::io;

use crate::types::ColumnKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while producing or consuming a Sorbet file.
///
/// Open and format errors are reported at open time and leave the handle
/// unusable. Protocol errors are reported at the offending read; there is no
/// partial recovery.
#[derive(Debug)]
pub enum Error {
    /// Underlying I/O failure (open, read, write, seek, flush).
    Io(io::Error),
    /// The first eight bytes are not the Sorbet signature.
    BadSignature(i64),
    /// The file declares a format version newer than this library supports.
    UnsupportedVersion { found: u8, supported: u8 },
    /// A column descriptor carries a type byte outside the known kinds
    /// (including the reserved `List`/`Map` slots).
    UnknownColumnType(u8),
    /// The header ended before it was fully parsed.
    TruncatedHeader,
    /// The value stream ended mid-cell.
    UnexpectedEof,
    /// The deflate/inflate stream reported a failure.
    Compression(String),
    /// A cell's tag byte is neither the expected kind's tag nor its null tag.
    UnexpectedTag { expected: ColumnKind, found: u8 },
    /// A length prefix is negative, or a payload is too large to frame.
    InvalidLength(i64),
    /// A string cell's payload is not valid UTF-8.
    InvalidUtf8,
    /// A writer or reader was opened with a schema of zero columns.
    EmptySchema,
    /// A cell read was issued after the last row recorded in the header.
    EndOfRows,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {e}"),
            Error::BadSignature(found) => {
                write!(f, "not a sorbet file (signature {found:#018x})")
            }
            Error::UnsupportedVersion { found, supported } => write!(
                f,
                "file version {found} is newer than supported version {supported}"
            ),
            Error::UnknownColumnType(tag) => write!(f, "unknown column type tag {tag}"),
            Error::TruncatedHeader => f.write_str("truncated header"),
            Error::UnexpectedEof => f.write_str("unexpected end of value stream"),
            Error::Compression(msg) => write!(f, "compression stream error: {msg}"),
            Error::UnexpectedTag { expected, found } => write!(
                f,
                "expected a {expected} cell (tag {} or {}), found tag {found}",
                expected.tag(),
                expected.null_tag()
            ),
            Error::InvalidLength(len) => write!(f, "length prefix {len} out of range"),
            Error::InvalidUtf8 => f.write_str("string cell is not valid UTF-8"),
            Error::EmptySchema => f.write_str("schema has no columns"),
            Error::EndOfRows => f.write_str("all rows have been read"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_expected_tags() {
        let e = Error::UnexpectedTag {
            expected: ColumnKind::Integer,
            found: 6,
        };
        let msg = e.to_string();
        assert!(msg.contains("integer"), "{msg}");
        assert!(msg.contains("tag 1 or 91"), "{msg}");
        assert!(msg.contains("found tag 6"), "{msg}");
    }

    #[test]
    fn io_error_is_exposed_as_source() {
        use std::error::Error as _;
        let e = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.source().is_some());
        assert!(Error::TruncatedHeader.source().is_none());
    }
}
