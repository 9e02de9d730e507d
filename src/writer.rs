//! Streaming Sorbet writer.
//!
//! A writer is opened with a schema, accepts one typed cell at a time in
//! row-major order, and finalizes the file at close: the deflate stream is
//! drained, the sink is rewound, and the header is rewritten with the true
//! row count and per-column statistics. Header and metadata bytes are never
//! compressed; the value stream is a single gzip member when compression is
//! requested.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use log::{debug, warn};

use crate::buffer::WriteBuffer;
use crate::error::{Error, Result};
use crate::schema::{ColumnStats, Schema};
use crate::types::{ColumnKind, Date, Time};
use crate::{FORMAT_VERSION, SIGNATURE};

// ─────────────────────────────────────────────────────────────────────────────
// WriterOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Open-time settings for a [`Writer`].
///
/// `metadata` is an opaque blob stored uncompressed between the header and
/// the value stream; `metadata_type` is a producer-defined discriminator for
/// it. An empty blob writes a zeroed metadata region.
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Wrap the value stream in a gzip member.
    pub compress: bool,
    pub metadata_type: i32,
    pub metadata: Vec<u8>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming writer for one Sorbet file.
///
/// Cells are written with the typed `write_*` methods, one per column in
/// schema order; after the last column the cursor wraps and the row count
/// advances. [`Writer::close`] consumes the writer, so writing after close
/// is unrepresentable. Dropping an unclosed writer finalizes the file on a
/// best-effort basis; call `close` to observe errors.
#[derive(Debug)]
pub struct Writer<W: Write + Seek> {
    buf: WriteBuffer<W>,
    schema: Schema,
    stats: Vec<ColumnStats>,
    options: WriterOptions,
    n_rows: i64,
    cur_col: usize,
    closed: bool,
}

impl Writer<File> {
    /// Truncate-create `path` and open a writer over it.
    pub fn create<P: AsRef<Path>>(
        path: P,
        schema: &Schema,
        options: &WriterOptions,
    ) -> Result<Self> {
        Writer::open(File::create(path)?, schema, options)
    }
}

impl<W: Write + Seek> Writer<W> {
    /// Open a writer over any seekable sink.
    ///
    /// Emits the placeholder header and the metadata region immediately,
    /// flushed uncompressed, and leaves the writer ready for the first cell.
    pub fn open(sink: W, schema: &Schema, options: &WriterOptions) -> Result<Self> {
        if schema.is_empty() {
            return Err(Error::EmptySchema);
        }
        let mut writer = Writer {
            buf: WriteBuffer::new(sink, options.compress),
            schema: schema.clone(),
            stats: vec![ColumnStats::default(); schema.num_cols()],
            options: options.clone(),
            n_rows: 0,
            cur_col: 0,
            closed: false,
        };
        writer.write_header(0, 0)?;
        writer.write_metadata()?;
        writer.buf.flush_raw()?;
        writer.buf.set_compress_active(true);
        debug!(
            "sorbet writer open: {} columns, compress={}",
            writer.schema.num_cols(),
            writer.options.compress
        );
        Ok(writer)
    }

    /// Completed rows so far.
    pub fn rows_written(&self) -> i64 {
        self.n_rows
    }

    /// Logical bytes accepted so far, header included.
    pub fn uncompressed_size(&self) -> u64 {
        self.buf.uncompressed_size()
    }

    // ── header / metadata ────────────────────────────────────────────────────

    fn write_header(&mut self, n_rows: i64, uc_size: i64) -> Result<()> {
        self.buf.write_i64(SIGNATURE)?;
        self.buf.write_u8(FORMAT_VERSION)?;
        self.buf.write_u8(u8::from(self.options.compress))?;
        self.buf.write_i64(n_rows)?;
        self.buf.write_i64(uc_size)?;
        self.buf.write_i32(self.schema.num_cols() as i32)?;
        for (col, st) in self.schema.cols().iter().zip(&self.stats) {
            let name = col.name.as_bytes();
            let name_len =
                i32::try_from(name.len()).map_err(|_| Error::InvalidLength(name.len() as i64))?;
            self.buf.write_i32(name_len)?;
            self.buf.write_raw(name)?;
            self.buf.write_u8(col.kind.tag())?;
            self.buf.write_u8(col.val_kind.tag())?;
            self.buf.write_u8(col.key_kind.tag())?;
            self.buf.write_i32(st.display_width(col.kind))?;
            self.buf.write_i64(st.null_count)?;
            self.buf.write_i64(st.bad_count)?;
        }
        Ok(())
    }

    fn write_metadata(&mut self) -> Result<()> {
        if self.options.metadata.is_empty() {
            self.buf.write_i32(0)?;
            self.buf.write_i32(0)?;
        } else {
            let len = i32::try_from(self.options.metadata.len())
                .map_err(|_| Error::InvalidLength(self.options.metadata.len() as i64))?;
            self.buf.write_i32(self.options.metadata_type)?;
            self.buf.write_i32(len)?;
            self.buf.write_raw(&self.options.metadata)?;
        }
        Ok(())
    }

    // ── cell writes ──────────────────────────────────────────────────────────

    fn write_null(&mut self, kind: ColumnKind) -> Result<()> {
        self.buf.write_u8(kind.null_tag())?;
        self.stats[self.cur_col].note_null();
        Ok(())
    }

    fn advance(&mut self) {
        self.cur_col += 1;
        if self.cur_col >= self.schema.num_cols() {
            self.cur_col = 0;
            self.n_rows += 1;
        }
    }

    pub fn write_int(&mut self, v: Option<i32>) -> Result<()> {
        match v {
            Some(v) => {
                self.stats[self.cur_col].note_int(v);
                self.buf.write_u8(ColumnKind::Integer.tag())?;
                self.buf.write_i32(v)?;
            }
            None => self.write_null(ColumnKind::Integer)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_long(&mut self, v: Option<i64>) -> Result<()> {
        match v {
            Some(v) => {
                self.stats[self.cur_col].note_long(v);
                self.buf.write_u8(ColumnKind::Long.tag())?;
                self.buf.write_i64(v)?;
            }
            None => self.write_null(ColumnKind::Long)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_float(&mut self, v: Option<f32>) -> Result<()> {
        match v {
            Some(v) => {
                self.stats[self.cur_col].note_float(v);
                self.buf.write_u8(ColumnKind::Float.tag())?;
                self.buf.write_f32(v)?;
            }
            None => self.write_null(ColumnKind::Float)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_double(&mut self, v: Option<f64>) -> Result<()> {
        match v {
            Some(v) => {
                self.stats[self.cur_col].note_double(v);
                self.buf.write_u8(ColumnKind::Double.tag())?;
                self.buf.write_f64(v)?;
            }
            None => self.write_null(ColumnKind::Double)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_bool(&mut self, v: Option<bool>) -> Result<()> {
        match v {
            Some(v) => {
                self.buf.write_u8(ColumnKind::Boolean.tag())?;
                self.buf.write_u8(u8::from(v))?;
            }
            None => self.write_null(ColumnKind::Boolean)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_string(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            Some(s) => self.write_framed(ColumnKind::String, s.as_bytes())?,
            None => self.write_null(ColumnKind::String)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_binary(&mut self, v: Option<&[u8]>) -> Result<()> {
        match v {
            Some(bytes) => self.write_framed(ColumnKind::Binary, bytes)?,
            None => self.write_null(ColumnKind::Binary)?,
        }
        self.advance();
        Ok(())
    }

    /// Length-prefixed payload shared by string and binary cells.
    fn write_framed(&mut self, kind: ColumnKind, bytes: &[u8]) -> Result<()> {
        let len =
            i32::try_from(bytes.len()).map_err(|_| Error::InvalidLength(bytes.len() as i64))?;
        self.stats[self.cur_col].note_width(len);
        self.buf.write_u8(kind.tag())?;
        self.buf.write_i32(len)?;
        self.buf.write_raw(bytes)
    }

    pub fn write_date(&mut self, v: Option<Date>) -> Result<()> {
        match v {
            Some(d) => {
                self.buf.write_u8(ColumnKind::Date.tag())?;
                self.buf.write_i32(d.to_encoded())?;
            }
            None => self.write_null(ColumnKind::Date)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_datetime(&mut self, v: Option<i64>) -> Result<()> {
        match v {
            Some(dt) => {
                self.buf.write_u8(ColumnKind::Datetime.tag())?;
                self.buf.write_i64(dt)?;
            }
            None => self.write_null(ColumnKind::Datetime)?,
        }
        self.advance();
        Ok(())
    }

    pub fn write_time(&mut self, v: Option<Time>) -> Result<()> {
        match v {
            Some(t) => {
                self.buf.write_u8(ColumnKind::Time.tag())?;
                self.buf.write_i32(t.to_encoded())?;
            }
            None => self.write_null(ColumnKind::Time)?,
        }
        self.advance();
        Ok(())
    }

    // ── close ────────────────────────────────────────────────────────────────

    /// Finalize the file: drain the value stream, rewrite the header with
    /// the true row count and statistics, and flush the sink.
    pub fn close(mut self) -> Result<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.cur_col != 0 {
            warn!(
                "sorbet writer closed mid-row at column {} of {}; only {} completed rows recorded",
                self.cur_col,
                self.schema.num_cols(),
                self.n_rows
            );
        }

        let stream_res = if self.options.compress {
            self.buf.finish_stream()
        } else {
            self.buf.flush_raw()
        };
        let total = self.buf.uncompressed_size() as i64;

        // The header rewrite is attempted even when the stream flush failed;
        // a failure here leaves the file semantically invalid and outranks
        // the stream error.
        let rewrite_res = self.rewrite_header(total);
        debug!(
            "sorbet writer closed: {} rows, {} uncompressed bytes",
            self.n_rows, total
        );
        match rewrite_res {
            Err(e) => Err(e),
            Ok(()) => stream_res,
        }
    }

    fn rewrite_header(&mut self, uc_size: i64) -> Result<()> {
        self.buf.set_compress_active(false);
        self.buf.rewind()?;
        self.write_header(self.n_rows, uc_size)?;
        self.buf.flush_raw()?;
        self.buf.flush_sink()
    }
}

impl<W: Write + Seek> Drop for Writer<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use std::io::Cursor;

    fn two_col_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ColumnKind::Integer),
            Column::new("name", ColumnKind::String),
        ])
    }

    #[test]
    fn open_rejects_empty_schema() {
        let res = Writer::open(
            Cursor::new(Vec::new()),
            &Schema::default(),
            &WriterOptions::default(),
        );
        assert!(matches!(res, Err(Error::EmptySchema)));
    }

    #[test]
    fn placeholder_header_is_patched_at_close() {
        let mut bytes = Vec::new();
        {
            let mut w = Writer::open(
                Cursor::new(&mut bytes),
                &two_col_schema(),
                &WriterOptions::default(),
            )
            .unwrap();
            w.write_int(Some(1)).unwrap();
            w.write_string(Some("Moe")).unwrap();
            assert_eq!(w.rows_written(), 1);
            w.close().unwrap();
        }
        // n_rows at [10..18), patched from the placeholder 0 to 1.
        assert_eq!(i64::from_le_bytes(bytes[10..18].try_into().unwrap()), 1);
        // uc_size covers header + metadata + value stream.
        let uc = i64::from_le_bytes(bytes[18..26].try_into().unwrap());
        assert_eq!(uc, bytes.len() as i64);
    }

    #[test]
    fn cursor_wraps_after_last_column() {
        let mut bytes = Vec::new();
        let mut w = Writer::open(
            Cursor::new(&mut bytes),
            &two_col_schema(),
            &WriterOptions::default(),
        )
        .unwrap();
        w.write_int(Some(1)).unwrap();
        assert_eq!(w.rows_written(), 0);
        w.write_string(None).unwrap();
        assert_eq!(w.rows_written(), 1);
        w.close().unwrap();
    }

    #[test]
    fn same_input_produces_identical_files() {
        let write = || {
            let mut bytes = Vec::new();
            let mut w = Writer::open(
                Cursor::new(&mut bytes),
                &two_col_schema(),
                &WriterOptions {
                    compress: true,
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
        };
        assert_eq!(write(), write());
    }

    #[test]
    fn drop_finalizes_the_file() {
        let mut bytes = Vec::new();
        {
            let mut w = Writer::open(
                Cursor::new(&mut bytes),
                &two_col_schema(),
                &WriterOptions::default(),
            )
            .unwrap();
            w.write_int(Some(9)).unwrap();
            w.write_string(Some("x")).unwrap();
            // Dropped without close().
        }
        assert_eq!(i64::from_le_bytes(bytes[10..18].try_into().unwrap()), 1);
    }
}
