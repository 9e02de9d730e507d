//! Fixed-size buffered I/O over a seekable sink/source.
//!
//! All multi-byte primitives are little-endian, exactly their width, no
//! padding. The write side counts every byte it accepts into an
//! uncompressed-size counter; the read side counts every byte it hands out,
//! which the reader uses to locate the first value-stream byte after the
//! header.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::gzip::{Deflater, Inflater};

/// User buffer size, shared with the compression scratch.
pub const BUF_SIZE: usize = 16_384;

// ─────────────────────────────────────────────────────────────────────────────
// WriteBuffer
// ─────────────────────────────────────────────────────────────────────────────

/// Buffered writer over a seekable sink, with an optional gzip stage.
///
/// The gzip stage only applies while `compress_active` is set; header and
/// metadata bytes are flushed raw regardless of the file's compression flag.
#[derive(Debug)]
pub(crate) struct WriteBuffer<W: Write + Seek> {
    sink: W,
    buf: Box<[u8]>,
    offset: usize,
    uc_size: u64,
    deflater: Option<Deflater>,
    compress_active: bool,
}

impl<W: Write + Seek> WriteBuffer<W> {
    pub(crate) fn new(sink: W, compressed: bool) -> Self {
        WriteBuffer {
            sink,
            buf: vec![0u8; BUF_SIZE].into_boxed_slice(),
            offset: 0,
            uc_size: 0,
            deflater: compressed.then(Deflater::new),
            compress_active: false,
        }
    }

    /// Route subsequent flushes through the gzip stage (when the file is
    /// compressed). Off while the header and metadata regions are emitted.
    pub(crate) fn set_compress_active(&mut self, active: bool) {
        self.compress_active = active;
    }

    /// Logical bytes written so far, independent of compression.
    pub(crate) fn uncompressed_size(&self) -> u64 {
        self.uc_size
    }

    pub(crate) fn write_raw(&mut self, src: &[u8]) -> Result<()> {
        if self.offset + src.len() <= BUF_SIZE {
            self.buf[self.offset..self.offset + src.len()].copy_from_slice(src);
            self.offset += src.len();
        } else {
            // Fill the tail, flush, then stream full buffers.
            let head = BUF_SIZE - self.offset;
            self.buf[self.offset..].copy_from_slice(&src[..head]);
            self.offset = BUF_SIZE;
            self.flush()?;
            let mut rest = &src[head..];
            while rest.len() >= BUF_SIZE {
                self.buf.copy_from_slice(&rest[..BUF_SIZE]);
                self.offset = BUF_SIZE;
                self.flush()?;
                rest = &rest[BUF_SIZE..];
            }
            self.buf[..rest.len()].copy_from_slice(rest);
            self.offset = rest.len();
        }
        self.uc_size += src.len() as u64;
        Ok(())
    }

    pub(crate) fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_raw(&[v])
    }

    pub(crate) fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub(crate) fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub(crate) fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub(crate) fn write_f64(&mut self, v: f64) -> Result<()> {
        self.write_raw(&v.to_le_bytes())
    }

    /// Flush buffered bytes through the active path.
    pub(crate) fn flush(&mut self) -> Result<()> {
        match &mut self.deflater {
            Some(def) if self.compress_active => {
                def.drain(&self.buf[..self.offset], &mut self.sink, false)?;
            }
            _ => {
                self.sink.write_all(&self.buf[..self.offset])?;
            }
        }
        self.offset = 0;
        Ok(())
    }

    /// Flush buffered bytes straight to the sink, bypassing the gzip stage.
    pub(crate) fn flush_raw(&mut self) -> Result<()> {
        self.sink.write_all(&self.buf[..self.offset])?;
        self.offset = 0;
        Ok(())
    }

    /// Drain remaining buffered bytes and terminate the gzip member.
    ///
    /// Runs the finish pass even when the buffer is empty; a value stream
    /// ending exactly on a buffer boundary still needs its trailer.
    pub(crate) fn finish_stream(&mut self) -> Result<()> {
        match &mut self.deflater {
            Some(def) => def.drain(&self.buf[..self.offset], &mut self.sink, true)?,
            None => self.sink.write_all(&self.buf[..self.offset])?,
        }
        self.offset = 0;
        Ok(())
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.sink.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub(crate) fn flush_sink(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.sink
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReadBuffer
// ─────────────────────────────────────────────────────────────────────────────

/// Buffered reader over a seekable source, with an optional gzip stage.
///
/// `size` is the effective extent of the buffer; it shrinks below
/// [`BUF_SIZE`] on short reads at end-of-file (or at the end of the gzip
/// member) and requests beyond it report [`Error::UnexpectedEof`].
#[derive(Debug)]
pub(crate) struct ReadBuffer<R: Read + Seek> {
    src: R,
    buf: Box<[u8]>,
    offset: usize,
    size: usize,
    read_cnt: u64,
    inflater: Option<Inflater>,
}

impl<R: Read + Seek> ReadBuffer<R> {
    pub(crate) fn new(src: R) -> Self {
        ReadBuffer {
            src,
            buf: vec![0u8; BUF_SIZE].into_boxed_slice(),
            offset: 0,
            size: 0,
            read_cnt: 0,
            inflater: None,
        }
    }

    /// Bytes handed out so far.
    pub(crate) fn bytes_read(&self) -> u64 {
        self.read_cnt
    }

    /// Seek the raw source to `pos`, discard buffered bytes, and install the
    /// gzip stage when the value stream is compressed.
    pub(crate) fn reposition(&mut self, pos: u64, compressed: bool) -> Result<()> {
        self.src.seek(SeekFrom::Start(pos))?;
        self.offset = 0;
        self.size = 0;
        self.inflater = compressed.then(Inflater::new);
        Ok(())
    }

    /// Refill the buffer, preserving any unread suffix at the front.
    fn fill(&mut self) -> Result<()> {
        let left = self.size - self.offset;
        self.buf.copy_within(self.offset..self.size, 0);
        self.offset = 0;
        match &mut self.inflater {
            Some(inf) => {
                let (produced, _ended) = inf.fill(&mut self.src, &mut self.buf[left..])?;
                self.size = left + produced;
            }
            None => {
                let mut at = left;
                while at < BUF_SIZE {
                    let n = self.src.read(&mut self.buf[at..])?;
                    if n == 0 {
                        break;
                    }
                    at += n;
                }
                self.size = at;
            }
        }
        Ok(())
    }

    pub(crate) fn read_raw(&mut self, dst: &mut [u8]) -> Result<()> {
        let len = dst.len();
        if self.offset + len <= self.size {
            // Already resident.
            dst.copy_from_slice(&self.buf[self.offset..self.offset + len]);
            self.offset += len;
        } else if len <= BUF_SIZE {
            // Spans the end of the buffer but fits after one refill.
            self.fill()?;
            if len > self.size {
                return Err(Error::UnexpectedEof);
            }
            dst.copy_from_slice(&self.buf[..len]);
            self.offset = len;
        } else {
            // Larger than the buffer: loop refill + copy.
            let mut done = 0;
            while done < len {
                if self.offset == self.size {
                    self.fill()?;
                    if self.size == 0 {
                        return Err(Error::UnexpectedEof);
                    }
                }
                let take = (self.size - self.offset).min(len - done);
                dst[done..done + take]
                    .copy_from_slice(&self.buf[self.offset..self.offset + take]);
                self.offset += take;
                done += take;
            }
        }
        self.read_cnt += len as u64;
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_raw(&mut b)?;
        Ok(b[0])
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_raw(&mut b)?;
        Ok(i32::from_le_bytes(b))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_raw(&mut b)?;
        Ok(i64::from_le_bytes(b))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32> {
        let mut b = [0u8; 4];
        self.read_raw(&mut b)?;
        Ok(f32::from_le_bytes(b))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        let mut b = [0u8; 8];
        self.read_raw(&mut b)?;
        Ok(f64::from_le_bytes(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn primitives_are_little_endian() {
        let mut wb = WriteBuffer::new(Cursor::new(Vec::new()), false);
        wb.write_u8(0xAB).unwrap();
        wb.write_i32(0x0102_0304).unwrap();
        wb.write_i64(-1).unwrap();
        wb.write_f32(1.0).unwrap();
        wb.flush_raw().unwrap();
        let bytes = wb.into_inner().into_inner();
        assert_eq!(bytes[0], 0xAB);
        assert_eq!(&bytes[1..5], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[5..13], &[0xFF; 8]);
        assert_eq!(&bytes[13..17], &1.0f32.to_le_bytes());

        let mut rb = ReadBuffer::new(Cursor::new(bytes));
        assert_eq!(rb.read_u8().unwrap(), 0xAB);
        assert_eq!(rb.read_i32().unwrap(), 0x0102_0304);
        assert_eq!(rb.read_i64().unwrap(), -1);
        assert_eq!(rb.read_f32().unwrap(), 1.0);
        assert_eq!(rb.bytes_read(), 17);
    }

    #[test]
    fn uncompressed_size_counts_source_bytes() {
        let mut wb = WriteBuffer::new(Cursor::new(Vec::new()), false);
        wb.write_raw(&[0u8; 10]).unwrap();
        wb.write_i64(5).unwrap();
        assert_eq!(wb.uncompressed_size(), 18);
        // Spanning writes count too.
        wb.write_raw(&vec![1u8; BUF_SIZE * 2 + 3]).unwrap();
        assert_eq!(wb.uncompressed_size(), 18 + (BUF_SIZE as u64) * 2 + 3);
    }

    #[test]
    fn write_spanning_multiple_buffers_round_trips() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(BUF_SIZE * 3 + 123).collect();
        let mut wb = WriteBuffer::new(Cursor::new(Vec::new()), false);
        wb.write_raw(&payload).unwrap();
        wb.flush_raw().unwrap();
        let bytes = wb.into_inner().into_inner();
        assert_eq!(bytes, payload);
    }

    #[test]
    fn read_spanning_refill_preserves_unread_suffix() {
        // Lay out values so a 4-byte read straddles the first refill.
        let mut bytes = vec![0u8; BUF_SIZE - 2];
        bytes.extend_from_slice(&0x1122_3344i32.to_le_bytes());
        bytes.extend_from_slice(&[9u8; 64]);
        let mut rb = ReadBuffer::new(Cursor::new(bytes));
        let mut skip = vec![0u8; BUF_SIZE - 2];
        rb.read_raw(&mut skip).unwrap();
        assert_eq!(rb.read_i32().unwrap(), 0x1122_3344);
        let mut tail = [0u8; 64];
        rb.read_raw(&mut tail).unwrap();
        assert_eq!(tail, [9u8; 64]);
    }

    #[test]
    fn read_larger_than_buffer() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(BUF_SIZE * 2 + 500).collect();
        let mut rb = ReadBuffer::new(Cursor::new(payload.clone()));
        let mut out = vec![0u8; payload.len()];
        rb.read_raw(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn reading_past_eof_is_an_error() {
        let mut rb = ReadBuffer::new(Cursor::new(vec![1u8, 2, 3]));
        let mut out = [0u8; 3];
        rb.read_raw(&mut out).unwrap();
        assert!(matches!(rb.read_u8(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn compressed_round_trip_through_both_buffers() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(BUF_SIZE * 2 + 77).collect();

        let mut wb = WriteBuffer::new(Cursor::new(Vec::new()), true);
        wb.set_compress_active(true);
        wb.write_raw(&payload).unwrap();
        wb.finish_stream().unwrap();
        let bytes = wb.into_inner().into_inner();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

        let mut rb = ReadBuffer::new(Cursor::new(bytes));
        rb.reposition(0, true).unwrap();
        let mut out = vec![0u8; payload.len()];
        rb.read_raw(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn raw_prefix_then_compressed_tail() {
        // Header discipline: raw bytes first, gzip member after.
        let mut wb = WriteBuffer::new(Cursor::new(Vec::new()), true);
        wb.write_raw(b"HEADER").unwrap();
        wb.flush_raw().unwrap();
        wb.set_compress_active(true);
        wb.write_raw(b"value stream bytes").unwrap();
        wb.finish_stream().unwrap();
        let bytes = wb.into_inner().into_inner();
        assert_eq!(&bytes[..6], b"HEADER");

        let mut rb = ReadBuffer::new(Cursor::new(bytes));
        let mut head = [0u8; 6];
        rb.read_raw(&mut head).unwrap();
        assert_eq!(rb.bytes_read(), 6);
        rb.reposition(rb.bytes_read(), true).unwrap();
        let mut tail = [0u8; 18];
        rb.read_raw(&mut tail).unwrap();
        assert_eq!(&tail, b"value stream bytes");
    }
}
