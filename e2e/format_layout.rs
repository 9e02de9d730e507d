//! Byte-level layout assertions against the documented on-disk format,
//! including acceptance of version-2 files whose column records carry no
//! bad count.

use std::io::Cursor;

use sorbet::{Column, ColumnKind, Reader, Schema, Writer, WriterOptions, FORMAT_VERSION, SIGNATURE};

/// Append the little-endian encoding of each header field by hand.
struct RawFile(Vec<u8>);

impl RawFile {
    fn new() -> Self {
        RawFile(Vec::new())
    }
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }
    fn i32(mut self, v: i32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn i64(mut self, v: i64) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn bytes(mut self, v: &[u8]) -> Self {
        self.0.extend_from_slice(v);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Full header walk for the two-column sample
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn header_layout_field_by_field() {
    let schema = Schema::new(vec![
        Column::new("id", ColumnKind::Integer),
        Column::new("name", ColumnKind::String),
    ]);
    let mut bytes = Vec::new();
    let mut w = Writer::open(Cursor::new(&mut bytes), &schema, &WriterOptions::default()).unwrap();
    for (id, name) in [(1, "Moe"), (2, "Shemp"), (3, "Larry")] {
        w.write_int(Some(id)).unwrap();
        w.write_string(Some(name)).unwrap();
    }
    w.close().unwrap();

    let i32_at = |at: usize| i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
    let i64_at = |at: usize| i64::from_le_bytes(bytes[at..at + 8].try_into().unwrap());

    assert_eq!(i64_at(0), SIGNATURE);
    assert_eq!(bytes[8], FORMAT_VERSION);
    assert_eq!(bytes[9], 0); // compression flag
    assert_eq!(i64_at(10), 3); // n_rows
    assert_eq!(i64_at(18), bytes.len() as i64); // uc_size == file size when raw
    assert_eq!(i32_at(26), 2); // numCols

    // Column 0: "id", integer, scalar.
    assert_eq!(i32_at(30), 2);
    assert_eq!(&bytes[34..36], b"id");
    assert_eq!(bytes[36], ColumnKind::Integer.tag());
    assert_eq!(bytes[37], ColumnKind::Null.tag());
    assert_eq!(bytes[38], ColumnKind::Null.tag());
    assert_eq!(i32_at(39), 1); // display width of 3
    assert_eq!(i64_at(43), 0); // null count
    assert_eq!(i64_at(51), 0); // bad count

    // Column 1: "name", string, scalar.
    assert_eq!(i32_at(59), 4);
    assert_eq!(&bytes[63..67], b"name");
    assert_eq!(bytes[67], ColumnKind::String.tag());
    assert_eq!(i32_at(70), 5); // "Shemp"
    assert_eq!(i64_at(74), 0);
    assert_eq!(i64_at(82), 0);

    // Empty metadata region.
    assert_eq!(i32_at(90), 0);
    assert_eq!(i32_at(94), 0);

    // First cell: integer tag then 1, little-endian.
    assert_eq!(bytes[98], ColumnKind::Integer.tag());
    assert_eq!(i32_at(99), 1);
    // Second cell: string tag, length, payload.
    assert_eq!(bytes[103], ColumnKind::String.tag());
    assert_eq!(i32_at(104), 3);
    assert_eq!(&bytes[108..111], b"Moe");
}

// ─────────────────────────────────────────────────────────────────────────────
// Null tags on the wire
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn null_cells_are_one_tag_byte_with_no_payload() {
    let schema = Schema::new(vec![Column::new("x", ColumnKind::Integer)]);
    let mut bytes = Vec::new();
    let mut w = Writer::open(Cursor::new(&mut bytes), &schema, &WriterOptions::default()).unwrap();
    w.write_int(None).unwrap();
    w.write_int(Some(5)).unwrap();
    w.close().unwrap();

    // Single "x" column header ends at 58; empty metadata ends at 66.
    assert_eq!(bytes[66], ColumnKind::Integer.null_tag());
    assert_eq!(bytes[66], ColumnKind::Integer.tag() + 90);
    // The next cell starts immediately after the lone null tag byte.
    assert_eq!(bytes[67], ColumnKind::Integer.tag());
    assert_eq!(i32::from_le_bytes(bytes[68..72].try_into().unwrap()), 5);
    assert_eq!(bytes.len(), 72);
}

// ─────────────────────────────────────────────────────────────────────────────
// Version gating: a version-2 file has no per-column bad count
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn version_two_file_synthesizes_zero_bad_count() {
    let file = RawFile::new()
        .i64(SIGNATURE)
        .u8(2) // version
        .u8(0) // uncompressed
        .i64(2) // n_rows
        .i64(0) // uc_size (informational)
        .i32(1) // numCols
        .i32(1)
        .bytes(b"x")
        .u8(ColumnKind::Integer.tag())
        .u8(ColumnKind::Null.tag())
        .u8(ColumnKind::Null.tag())
        .i32(1) // display width
        .i64(1) // null count
        // no bad_count in version 2
        .i32(0) // metadata type
        .i32(0) // metadata size
        .u8(ColumnKind::Integer.tag())
        .i32(7)
        .u8(ColumnKind::Integer.null_tag());

    let mut r = Reader::open(Cursor::new(file.0)).expect("version 2 accepted");
    assert_eq!(r.version(), 2);
    assert_eq!(r.n_rows(), 2);
    assert_eq!(r.stats()[0].bad_count, 0);
    assert_eq!(r.stats()[0].null_count, 1);
    assert_eq!(r.read_int().unwrap(), Some(7));
    assert_eq!(r.read_int().unwrap(), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Signature constant
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn signature_bytes_at_offset_zero() {
    assert_eq!(
        SIGNATURE.to_le_bytes(),
        [0xC0, 0xFF, 0xEE, 0xD0, 0x0D, 0x00, 0xFA, 0xCE]
    );
}
