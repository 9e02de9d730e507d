//! Sorbet: a self-describing, row-oriented, schema-tagged binary container
//! for tabular data with optional streaming gzip compression.
//!
//! A producer declares a [`Schema`], opens a [`Writer`], and streams row
//! values cell-by-cell; a consumer opens a [`Reader`], recovers the schema
//! and per-column statistics from the header, and streams the rows back out
//! in order. The on-disk format is little-endian throughout: a signature,
//! a versioned header with per-column statistics (rewritten at close), an
//! optional user metadata blob, and a tagged value stream stored raw or as
//! a single gzip member.
//!
//! ```no_run
//! use sorbet::{Column, ColumnKind, Reader, Schema, Writer, WriterOptions};
//!
//! # fn main() -> sorbet::Result<()> {
//! let schema = Schema::new(vec![
//!     Column::new("id", ColumnKind::Integer),
//!     Column::new("name", ColumnKind::String),
//! ]);
//! let mut writer = Writer::create("people.sorbet", &schema, &WriterOptions::default())?;
//! writer.write_int(Some(1))?;
//! writer.write_string(Some("Moe"))?;
//! writer.close()?;
//!
//! let mut reader = Reader::open_path("people.sorbet")?;
//! while let Some(row) = reader.read_row()? {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod reader;
pub mod schema;
pub mod types;
pub mod writer;

mod buffer;
mod gzip;

pub use buffer::BUF_SIZE;
pub use error::{Error, Result};
pub use reader::Reader;
pub use schema::{Column, ColumnStats, Schema};
pub use types::{ColumnKind, Date, Time, Value, NULL_TAG_OFFSET};
pub use writer::{Writer, WriterOptions};

/// The fixed 8-byte magic at offset 0, encoded little-endian as
/// `C0 FF EE D0 0D 00 FA CE`.
pub const SIGNATURE: i64 = -3_532_510_898_378_833_984;

/// File-format version this library writes. Readers accept any version up
/// to and including this one.
pub const FORMAT_VERSION: u8 = 3;

/// The format version this build of the library produces.
pub fn format_version() -> u8 {
    FORMAT_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_spells_its_magic() {
        assert_eq!(
            SIGNATURE.to_le_bytes(),
            [0xC0, 0xFF, 0xEE, 0xD0, 0x0D, 0x00, 0xFA, 0xCE]
        );
    }

    #[test]
    fn current_version() {
        assert_eq!(format_version(), 3);
    }
}
