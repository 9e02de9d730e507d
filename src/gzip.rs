//! Gzip adapter for the buffered value stream.
//!
//! The writer feeds each user-buffer flush through [`Deflater::drain`]; the
//! reader refills its user buffer through [`Inflater::fill`]. Both own a
//! scratch buffer of [`BUF_SIZE`] bytes, so one user-buffer flush may emit
//! several scratch loads and one refill may consume several.

use std::io::{Read, Write};

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::buffer::BUF_SIZE;
use crate::error::{Error, Result};

/// zlib window bits; combined with gzip encoding by the `flate2` gzip
/// constructors.
const WINDOW_BITS: u8 = 15;

// ─────────────────────────────────────────────────────────────────────────────
// Deflater
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming gzip compressor: default level, 32 KiB window, gzip framing.
#[derive(Debug)]
pub(crate) struct Deflater {
    strm: Compress,
    zbuf: Box<[u8]>,
}

impl Deflater {
    pub(crate) fn new() -> Self {
        Deflater {
            strm: Compress::new_gzip(Compression::default(), WINDOW_BITS),
            zbuf: vec![0u8; BUF_SIZE].into_boxed_slice(),
        }
    }

    /// Deflate `input` and write every produced scratch load to `sink`.
    ///
    /// With `finish` the deflate stream is drained to its gzip trailer; this
    /// must run exactly once, at close, and runs even when `input` is empty
    /// so a value stream ending on a buffer boundary is still terminated.
    pub(crate) fn drain<W: Write>(
        &mut self,
        mut input: &[u8],
        sink: &mut W,
        finish: bool,
    ) -> Result<()> {
        let flush = if finish {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };
        loop {
            let before_in = self.strm.total_in();
            let before_out = self.strm.total_out();
            let status = self
                .strm
                .compress(input, &mut self.zbuf, flush)
                .map_err(|e| Error::Compression(e.to_string()))?;
            let consumed = (self.strm.total_in() - before_in) as usize;
            let produced = (self.strm.total_out() - before_out) as usize;
            input = &input[consumed..];
            sink.write_all(&self.zbuf[..produced])?;

            if finish {
                if status == Status::StreamEnd {
                    return Ok(());
                }
            } else if input.is_empty() && produced < self.zbuf.len() {
                // Scratch space left over means deflate holds no pending
                // output for this flush.
                return Ok(());
            }
            if consumed == 0 && produced == 0 {
                return Err(Error::Compression("deflate made no progress".into()));
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inflater
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming gzip decompressor with its own raw-input scratch.
#[derive(Debug)]
pub(crate) struct Inflater {
    strm: Decompress,
    zbuf: Box<[u8]>,
    zpos: usize,
    zlen: usize,
    done: bool,
}

impl Inflater {
    pub(crate) fn new() -> Self {
        Inflater {
            strm: Decompress::new_gzip(WINDOW_BITS),
            zbuf: vec![0u8; BUF_SIZE].into_boxed_slice(),
            zpos: 0,
            zlen: 0,
            done: false,
        }
    }

    /// Inflate into `dst`, refilling the scratch from `src` as needed.
    ///
    /// Returns the number of bytes produced and whether the gzip stream
    /// ended. Raw EOF before the gzip trailer while `dst` still has room is
    /// a truncated file.
    pub(crate) fn fill<R: Read>(&mut self, src: &mut R, dst: &mut [u8]) -> Result<(usize, bool)> {
        let mut filled = 0;
        while filled < dst.len() {
            if self.done {
                return Ok((filled, true));
            }
            if self.zpos == self.zlen {
                self.zlen = src.read(&mut self.zbuf)?;
                self.zpos = 0;
                if self.zlen == 0 {
                    return Err(Error::UnexpectedEof);
                }
            }
            let before_in = self.strm.total_in();
            let before_out = self.strm.total_out();
            let status = self
                .strm
                .decompress(
                    &self.zbuf[self.zpos..self.zlen],
                    &mut dst[filled..],
                    FlushDecompress::None,
                )
                .map_err(|e| Error::Compression(e.to_string()))?;
            let consumed = (self.strm.total_in() - before_in) as usize;
            let produced = (self.strm.total_out() - before_out) as usize;
            self.zpos += consumed;
            filled += produced;
            if status == Status::StreamEnd {
                self.done = true;
                return Ok((filled, true));
            }
            if consumed == 0 && produced == 0 && self.zpos < self.zlen {
                return Err(Error::Compression("inflate made no progress".into()));
            }
        }
        Ok((filled, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn drain_then_fill_round_trips() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(3 * BUF_SIZE + 77).collect();

        let mut sink = Vec::new();
        let mut def = Deflater::new();
        // Feed in BUF_SIZE flushes the way the write buffer does.
        for chunk in payload.chunks(BUF_SIZE) {
            def.drain(chunk, &mut sink, false).unwrap();
        }
        def.drain(&[], &mut sink, true).unwrap();

        let mut src = Cursor::new(sink);
        let mut inf = Inflater::new();
        let mut out = vec![0u8; payload.len()];
        let mut at = 0;
        while at < out.len() {
            let want = (out.len() - at).min(BUF_SIZE);
            let (n, _ended) = inf.fill(&mut src, &mut out[at..at + want]).unwrap();
            assert!(n > 0);
            at += n;
        }
        assert_eq!(out, payload);
    }

    #[test]
    fn finish_on_empty_input_emits_a_complete_member() {
        let mut sink = Vec::new();
        let mut def = Deflater::new();
        def.drain(b"boundary", &mut sink, false).unwrap();
        def.drain(&[], &mut sink, true).unwrap();

        // gzip magic at the front, and the member inflates to completion.
        assert_eq!(&sink[..2], &[0x1f, 0x8b]);
        let mut inf = Inflater::new();
        let mut out = vec![0u8; BUF_SIZE];
        let (n, ended) = inf.fill(&mut Cursor::new(sink), &mut out).unwrap();
        assert_eq!(&out[..n], b"boundary");
        assert!(ended);
    }

    #[test]
    fn stream_end_reports_produced_count() {
        let mut sink = Vec::new();
        let mut def = Deflater::new();
        def.drain(b"tiny", &mut sink, true).unwrap();

        let mut inf = Inflater::new();
        let mut out = vec![0u8; BUF_SIZE];
        let (n, ended) = inf.fill(&mut Cursor::new(sink), &mut out).unwrap();
        assert_eq!(n, 4);
        assert!(ended);
        // A fill after the end produces nothing more.
        let (n2, ended2) = inf
            .fill(&mut Cursor::new(Vec::new()), &mut out)
            .unwrap();
        assert_eq!(n2, 0);
        assert!(ended2);
    }

    #[test]
    fn truncated_member_is_an_eof_error() {
        let mut sink = Vec::new();
        let mut def = Deflater::new();
        let payload = vec![7u8; 4 * BUF_SIZE];
        def.drain(&payload, &mut sink, true).unwrap();
        sink.truncate(sink.len() / 2);

        let mut inf = Inflater::new();
        let mut out = vec![0u8; payload.len()];
        let mut src = Cursor::new(sink);
        let mut at = 0;
        let err = loop {
            match inf.fill(&mut src, &mut out[at..]) {
                Ok((n, false)) => at += n,
                Ok((_, true)) => panic!("stream should not end cleanly"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::UnexpectedEof | Error::Compression(_)));
    }
}
