//! Error surfaces: open failures, malformed headers, protocol violations,
//! and truncated value streams.

use std::io::Cursor;

use sorbet::{Column, ColumnKind, Error, Reader, Schema, Writer, WriterOptions, FORMAT_VERSION};

fn one_int_file(values: &[Option<i32>]) -> Vec<u8> {
    let schema = Schema::new(vec![Column::new("x", ColumnKind::Integer)]);
    let mut bytes = Vec::new();
    let mut w = Writer::open(Cursor::new(&mut bytes), &schema, &WriterOptions::default()).unwrap();
    for v in values {
        w.write_int(*v).unwrap();
    }
    w.close().unwrap();
    bytes
}

// ─────────────────────────────────────────────────────────────────────────────
// Open errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Reader::open_path(dir.path().join("nope.sorbet")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn writer_rejects_empty_schema() {
    let err = Writer::open(
        Cursor::new(Vec::new()),
        &Schema::default(),
        &WriterOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::EmptySchema));
}

// ─────────────────────────────────────────────────────────────────────────────
// Format errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn bad_signature_is_rejected() {
    let mut bytes = one_int_file(&[Some(1)]);
    bytes[0] ^= 0xFF;
    let err = Reader::open(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, Error::BadSignature(_)));
}

#[test]
fn newer_version_is_rejected() {
    let mut bytes = one_int_file(&[Some(1)]);
    bytes[8] = FORMAT_VERSION + 1;
    let err = Reader::open(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedVersion { found, supported }
            if found == FORMAT_VERSION + 1 && supported == FORMAT_VERSION
    ));
}

#[test]
fn truncated_header_is_rejected() {
    let bytes = one_int_file(&[Some(1)]);
    for cut in [4, 12, 31, 50] {
        let err = Reader::open(Cursor::new(bytes[..cut].to_vec())).unwrap_err();
        assert!(
            matches!(err, Error::TruncatedHeader),
            "cut at {cut}: {err:?}"
        );
    }
}

#[test]
fn reserved_container_kind_in_header_is_rejected() {
    let mut bytes = one_int_file(&[Some(1)]);
    // The "x" column's type byte sits at offset 35 (30 header + 4 name_len
    // + 1 name byte). 11 is the reserved List slot.
    assert_eq!(bytes[35], ColumnKind::Integer.tag());
    bytes[35] = 11;
    let err = Reader::open(Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, Error::UnknownColumnType(11)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Protocol errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn mismatched_typed_read_is_rejected() {
    let bytes = one_int_file(&[Some(1)]);
    let mut r = Reader::open(Cursor::new(bytes)).unwrap();
    let err = r.read_string().unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedTag {
            expected: ColumnKind::String,
            found,
        } if found == ColumnKind::Integer.tag()
    ));
}

#[test]
fn corrupt_tag_byte_is_rejected() {
    let mut bytes = one_int_file(&[Some(1)]);
    let tag_at = bytes.len() - 5; // tag + i32 payload at the end
    bytes[tag_at] = 0x7F;
    let mut r = Reader::open(Cursor::new(bytes)).unwrap();
    let err = r.read_int().unwrap_err();
    assert!(matches!(err, Error::UnexpectedTag { found: 0x7F, .. }));
}

// ─────────────────────────────────────────────────────────────────────────────
// Truncation and end-of-rows
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn truncated_value_stream_surfaces_on_the_cell_read() {
    let bytes = one_int_file(&[Some(1), Some(2), Some(3)]);
    // Keep the header and the first cell; drop the rest.
    let cut = bytes.len() - 2 * 5;
    let mut r = Reader::open(Cursor::new(bytes[..cut].to_vec())).unwrap();
    assert_eq!(r.read_int().unwrap(), Some(1));
    let err = loop {
        match r.read_int() {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(matches!(err, Error::UnexpectedEof), "{err:?}");
}

#[test]
fn reads_are_bounded_by_the_row_count() {
    let bytes = one_int_file(&[Some(1), None]);
    let mut r = Reader::open(Cursor::new(bytes)).unwrap();
    assert_eq!(r.rows_remaining(), 2);
    assert_eq!(r.read_int().unwrap(), Some(1));
    assert_eq!(r.read_int().unwrap(), None);
    assert_eq!(r.rows_remaining(), 0);
    assert!(matches!(r.read_int(), Err(Error::EndOfRows)));
    assert!(r.read_row().unwrap().is_none());
}
