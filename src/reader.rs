//! Streaming Sorbet reader.
//!
//! Open parses the uncompressed header (signature, version, schema, stored
//! statistics, metadata), then repositions the raw source at the first
//! value-stream byte and installs the inflate stage when the file is
//! compressed. Cells are then consumed in row-major schema order, bounded by
//! the header's row count.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use log::debug;

use crate::buffer::ReadBuffer;
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnStats, Schema};
use crate::types::{ColumnKind, Date, Time, Value};
use crate::{FORMAT_VERSION, SIGNATURE};

/// Streaming reader for one Sorbet file.
///
/// The schema, stored statistics, and metadata recovered from the header are
/// queryable immediately after open. Typed `read_*` calls consume one cell
/// each and must follow the schema's column order; [`Reader::read_row`]
/// consumes a whole row and returns `Ok(None)` once the header's row count
/// is exhausted.
#[derive(Debug)]
pub struct Reader<R: Read + Seek> {
    buf: ReadBuffer<R>,
    schema: Schema,
    stats: Vec<ColumnStats>,
    version: u8,
    compressed: bool,
    n_rows: i64,
    uc_size: i64,
    metadata_type: i32,
    metadata: Option<Vec<u8>>,
    row_cnt: i64,
    cur_col: usize,
    row: Vec<Option<Value>>,
}

impl Reader<File> {
    /// Open a reader over the file at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Reader::open(File::open(path)?)
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Open a reader over any seekable source.
    pub fn open(src: R) -> Result<Self> {
        let mut buf = ReadBuffer::new(src);

        let sig = buf.read_i64().map_err(truncated)?;
        if sig != SIGNATURE {
            return Err(Error::BadSignature(sig));
        }
        let version = buf.read_u8().map_err(truncated)?;
        if version > FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let compressed = buf.read_u8().map_err(truncated)? != 0;
        let n_rows = buf.read_i64().map_err(truncated)?;
        let uc_size = buf.read_i64().map_err(truncated)?;
        let num_cols = buf.read_i32().map_err(truncated)?;
        if num_cols <= 0 {
            return Err(Error::EmptySchema);
        }

        let mut cols = Vec::with_capacity(num_cols as usize);
        let mut stats = Vec::with_capacity(num_cols as usize);
        for _ in 0..num_cols {
            let name_len = buf.read_i32().map_err(truncated)?;
            if name_len < 0 {
                return Err(Error::InvalidLength(i64::from(name_len)));
            }
            let mut name = vec![0u8; name_len as usize];
            buf.read_raw(&mut name).map_err(truncated)?;
            let name = String::from_utf8(name).map_err(|_| Error::InvalidUtf8)?;
            let kind = read_kind(&mut buf)?;
            let val_kind = read_kind(&mut buf)?;
            let key_kind = read_kind(&mut buf)?;
            let mut st = ColumnStats {
                max_width: buf.read_i32().map_err(truncated)?,
                null_count: buf.read_i64().map_err(truncated)?,
                ..ColumnStats::default()
            };
            // bad_count joined the column record in version 3.
            if version > 2 {
                st.bad_count = buf.read_i64().map_err(truncated)?;
            }
            cols.push(Column {
                name,
                kind,
                val_kind,
                key_kind,
            });
            stats.push(st);
        }

        let metadata_type = buf.read_i32().map_err(truncated)?;
        let metadata_size = buf.read_i32().map_err(truncated)?;
        if metadata_size < 0 {
            return Err(Error::InvalidLength(i64::from(metadata_size)));
        }
        let metadata = if metadata_size > 0 {
            let mut blob = vec![0u8; metadata_size as usize];
            buf.read_raw(&mut blob).map_err(truncated)?;
            Some(blob)
        } else {
            None
        };

        // The buffer read ahead of the header; put the raw cursor back on
        // the first value-stream byte and switch on inflate if needed.
        buf.reposition(buf.bytes_read(), compressed)?;

        let schema = Schema::new(cols);
        debug!(
            "sorbet reader open: version {version}, {} columns, {n_rows} rows, compressed={compressed}",
            schema.num_cols()
        );
        let row = vec![None; schema.num_cols()];
        Ok(Reader {
            buf,
            schema,
            stats,
            version,
            compressed,
            n_rows,
            uc_size,
            metadata_type,
            metadata,
            row_cnt: 0,
            cur_col: 0,
            row,
        })
    }

    // ── header accessors ─────────────────────────────────────────────────────

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Stored per-column statistics; `max_width` holds the display width
    /// baked in at write time.
    pub fn stats(&self) -> &[ColumnStats] {
        &self.stats
    }

    pub fn n_rows(&self) -> i64 {
        self.n_rows
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// Logical size recorded at close, header included.
    pub fn uncompressed_size(&self) -> i64 {
        self.uc_size
    }

    pub fn metadata_type(&self) -> i32 {
        self.metadata_type
    }

    pub fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }

    /// Rows not yet consumed.
    pub fn rows_remaining(&self) -> i64 {
        self.n_rows - self.row_cnt
    }

    // ── cell reads ───────────────────────────────────────────────────────────

    /// Consume one tag byte and report presence for the expected kind.
    fn read_tag(&mut self, expected: ColumnKind) -> Result<bool> {
        if self.row_cnt >= self.n_rows {
            return Err(Error::EndOfRows);
        }
        let found = self.buf.read_u8()?;
        if found == expected.tag() {
            Ok(true)
        } else if found == expected.null_tag() {
            Ok(false)
        } else {
            Err(Error::UnexpectedTag { expected, found })
        }
    }

    fn advance(&mut self) {
        self.cur_col += 1;
        if self.cur_col >= self.schema.num_cols() {
            self.cur_col = 0;
            self.row_cnt += 1;
        }
    }

    pub fn read_int(&mut self) -> Result<Option<i32>> {
        let present = self.read_tag(ColumnKind::Integer)?;
        let v = if present {
            Some(self.buf.read_i32()?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_long(&mut self) -> Result<Option<i64>> {
        let present = self.read_tag(ColumnKind::Long)?;
        let v = if present {
            Some(self.buf.read_i64()?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_float(&mut self) -> Result<Option<f32>> {
        let present = self.read_tag(ColumnKind::Float)?;
        let v = if present {
            Some(self.buf.read_f32()?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_double(&mut self) -> Result<Option<f64>> {
        let present = self.read_tag(ColumnKind::Double)?;
        let v = if present {
            Some(self.buf.read_f64()?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_bool(&mut self) -> Result<Option<bool>> {
        let present = self.read_tag(ColumnKind::Boolean)?;
        let v = if present {
            Some(self.buf.read_u8()? != 0)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        let present = self.read_tag(ColumnKind::String)?;
        let v = if present {
            let bytes = self.read_framed()?;
            Some(String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_binary(&mut self) -> Result<Option<Vec<u8>>> {
        let present = self.read_tag(ColumnKind::Binary)?;
        let v = if present {
            Some(self.read_framed()?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    /// Length-prefixed payload shared by string and binary cells.
    fn read_framed(&mut self) -> Result<Vec<u8>> {
        let len = self.buf.read_i32()?;
        if len < 0 {
            return Err(Error::InvalidLength(i64::from(len)));
        }
        let mut bytes = vec![0u8; len as usize];
        self.buf.read_raw(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read_date(&mut self) -> Result<Option<Date>> {
        let present = self.read_tag(ColumnKind::Date)?;
        let v = if present {
            Some(Date::from_encoded(self.buf.read_i32()?))
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_datetime(&mut self) -> Result<Option<i64>> {
        let present = self.read_tag(ColumnKind::Datetime)?;
        let v = if present {
            Some(self.buf.read_i64()?)
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    pub fn read_time(&mut self) -> Result<Option<Time>> {
        let present = self.read_tag(ColumnKind::Time)?;
        let v = if present {
            Some(Time::from_encoded(self.buf.read_i32()?))
        } else {
            None
        };
        self.advance();
        Ok(v)
    }

    // ── whole-row convenience ────────────────────────────────────────────────

    /// Read the next row into a reused per-column buffer.
    ///
    /// Returns `Ok(None)` once all `n_rows` rows have been consumed.
    pub fn read_row(&mut self) -> Result<Option<&[Option<Value>]>> {
        if self.row_cnt >= self.n_rows {
            return Ok(None);
        }
        for i in 0..self.schema.num_cols() {
            let kind = self.schema.col(i).kind;
            self.row[i] = match kind {
                ColumnKind::Integer => self.read_int()?.map(Value::Integer),
                ColumnKind::Long => self.read_long()?.map(Value::Long),
                ColumnKind::Float => self.read_float()?.map(Value::Float),
                ColumnKind::Double => self.read_double()?.map(Value::Double),
                ColumnKind::Boolean => self.read_bool()?.map(Value::Boolean),
                ColumnKind::String => self.read_string()?.map(Value::String),
                ColumnKind::Binary => self.read_binary()?.map(Value::Binary),
                ColumnKind::Date => self.read_date()?.map(Value::Date),
                ColumnKind::Datetime => self.read_datetime()?.map(Value::Datetime),
                ColumnKind::Time => self.read_time()?.map(Value::Time),
                ColumnKind::Null => return Err(Error::UnknownColumnType(kind.tag())),
            };
        }
        Ok(Some(&self.row))
    }

    /// Release the reader.
    pub fn close(self) {}
}

fn read_kind<R: Read + Seek>(buf: &mut ReadBuffer<R>) -> Result<ColumnKind> {
    let tag = buf.read_u8().map_err(truncated)?;
    ColumnKind::from_tag(tag).ok_or(Error::UnknownColumnType(tag))
}

/// Header parse context: an early end of input is a truncated header.
fn truncated(e: Error) -> Error {
    match e {
        Error::UnexpectedEof => Error::TruncatedHeader,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{Writer, WriterOptions};
    use std::io::Cursor;

    fn sample_file(compress: bool) -> Vec<u8> {
        let schema = Schema::new(vec![
            Column::new("id", ColumnKind::Integer),
            Column::new("name", ColumnKind::String),
        ]);
        let mut bytes = Vec::new();
        let mut w = Writer::open(
            Cursor::new(&mut bytes),
            &schema,
            &WriterOptions {
                compress,
                ..WriterOptions::default()
            },
        )
        .unwrap();
        for (id, name) in [(1, "Moe"), (2, "Shemp"), (3, "Larry")] {
            w.write_int(Some(id)).unwrap();
            w.write_string(Some(name)).unwrap();
        }
        w.close().unwrap();
        bytes
    }

    #[test]
    fn recovers_schema_and_counts() {
        let mut r = Reader::open(Cursor::new(sample_file(false))).unwrap();
        assert_eq!(r.version(), FORMAT_VERSION);
        assert_eq!(r.n_rows(), 3);
        assert_eq!(r.schema().num_cols(), 2);
        assert_eq!(r.schema().col(0).name, "id");
        assert_eq!(r.schema().col(0).kind, ColumnKind::Integer);
        assert_eq!(r.schema().col(1).name, "name");
        assert_eq!(r.schema().col(1).kind, ColumnKind::String);
        assert_eq!(r.stats()[0].max_width, 1);
        assert_eq!(r.stats()[1].max_width, 5);
        assert_eq!(r.read_int().unwrap(), Some(1));
        assert_eq!(r.read_string().unwrap().as_deref(), Some("Moe"));
    }

    #[test]
    fn typed_reads_walk_rows_in_order() {
        let mut r = Reader::open(Cursor::new(sample_file(true))).unwrap();
        let mut got = Vec::new();
        for _ in 0..r.n_rows() {
            let id = r.read_int().unwrap().unwrap();
            let name = r.read_string().unwrap().unwrap();
            got.push((id, name));
        }
        assert_eq!(
            got,
            vec![
                (1, "Moe".to_string()),
                (2, "Shemp".to_string()),
                (3, "Larry".to_string())
            ]
        );
        assert!(matches!(r.read_int(), Err(Error::EndOfRows)));
    }

    #[test]
    fn read_row_stops_at_row_count() {
        let mut r = Reader::open(Cursor::new(sample_file(false))).unwrap();
        let mut names = Vec::new();
        while let Some(row) = r.read_row().unwrap() {
            match &row[1] {
                Some(Value::String(s)) => names.push(s.clone()),
                other => panic!("unexpected cell {other:?}"),
            }
        }
        assert_eq!(names, ["Moe", "Shemp", "Larry"]);
        assert_eq!(r.rows_remaining(), 0);
        assert!(r.read_row().unwrap().is_none());
    }

    #[test]
    fn wrong_entry_point_is_a_protocol_error() {
        let mut r = Reader::open(Cursor::new(sample_file(false))).unwrap();
        // First cell is an integer; asking for a long must fail.
        let err = r.read_long().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedTag {
                expected: ColumnKind::Long,
                found: 1
            }
        ));
    }
}
