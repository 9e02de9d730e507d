//! End-to-end round trips: write a file, read it back, compare.
//!
//! Covers plain and gzip-compressed value streams, null cells, values larger
//! than the 16 KiB I/O buffer, user metadata, every column kind, and the
//! determinism of close.

use std::io::{Cursor, Read};

use sorbet::{Column, ColumnKind, Date, Error, Reader, Schema, Time, Value, Writer, WriterOptions};

fn people_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", ColumnKind::Integer),
        Column::new("name", ColumnKind::String),
    ])
}

fn write_people(compress: bool) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut w = Writer::open(
        Cursor::new(&mut bytes),
        &people_schema(),
        &WriterOptions {
            compress,
            ..WriterOptions::default()
        },
    )
    .expect("open writer");
    for (id, name) in [(1, "Moe"), (2, "Shemp"), (3, "Larry")] {
        w.write_int(Some(id)).expect("write id");
        w.write_string(Some(name)).expect("write name");
    }
    w.close().expect("close writer");
    bytes
}

// ─────────────────────────────────────────────────────────────────────────────
// Two scalar columns, three rows, uncompressed
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn two_columns_three_rows_uncompressed() {
    let bytes = write_people(false);

    // Signature, version, compression flag, counts.
    assert_eq!(
        &bytes[..8],
        &[0xC0, 0xFF, 0xEE, 0xD0, 0x0D, 0x00, 0xFA, 0xCE]
    );
    assert_eq!(bytes[8], 3);
    assert_eq!(bytes[9], 0);
    assert_eq!(i64::from_le_bytes(bytes[10..18].try_into().unwrap()), 3);
    assert_eq!(i32::from_le_bytes(bytes[26..30].try_into().unwrap()), 2);

    let mut r = Reader::open(Cursor::new(bytes)).expect("open reader");
    assert_eq!(r.n_rows(), 3);
    assert_eq!(r.schema(), &people_schema());
    // id max is 3 → one decimal digit; "Shemp" is the widest name.
    assert_eq!(r.stats()[0].max_width, 1);
    assert_eq!(r.stats()[1].max_width, 5);

    for (id, name) in [(1, "Moe"), (2, "Shemp"), (3, "Larry")] {
        assert_eq!(r.read_int().unwrap(), Some(id));
        assert_eq!(r.read_string().unwrap().as_deref(), Some(name));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Same rows, compressed: header raw, value stream one gzip member
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn compressed_file_shares_header_and_inflates_to_same_values() {
    let plain = write_people(false);
    let gz = write_people(true);

    // Header and metadata bytes are identical apart from the compression
    // flag at offset 9. Value stream begins at 98 for this schema.
    const VALUES_AT: usize = 98;
    assert_eq!(plain[9], 0);
    assert_eq!(gz[9], 1);
    assert_eq!(&plain[..9], &gz[..9]);
    assert_eq!(&plain[10..VALUES_AT], &gz[10..VALUES_AT]);

    // The compressed tail is a single gzip member holding exactly the bytes
    // the uncompressed file stores after its header.
    let mut inflated = Vec::new();
    flate2::read::GzDecoder::new(&gz[VALUES_AT..])
        .read_to_end(&mut inflated)
        .expect("valid gzip member");
    assert_eq!(inflated, &plain[VALUES_AT..]);

    let mut r = Reader::open(Cursor::new(gz)).expect("open compressed");
    assert!(r.compressed());
    for (id, name) in [(1, "Moe"), (2, "Shemp"), (3, "Larry")] {
        assert_eq!(r.read_int().unwrap(), Some(id));
        assert_eq!(r.read_string().unwrap().as_deref(), Some(name));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Null cells
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn null_cell_round_trip_and_stats() {
    let schema = Schema::new(vec![Column::new("x", ColumnKind::Integer)]);
    let mut bytes = Vec::new();
    let mut w = Writer::open(Cursor::new(&mut bytes), &schema, &WriterOptions::default()).unwrap();
    w.write_int(Some(7)).unwrap();
    w.write_int(None).unwrap();
    w.write_int(Some(-4)).unwrap();
    w.close().unwrap();

    let mut r = Reader::open(Cursor::new(bytes)).unwrap();
    assert_eq!(r.n_rows(), 3);
    assert_eq!(r.stats()[0].null_count, 1);
    // |−4| < |7|, so the magnitude maximum stays 7 → display width 1.
    assert_eq!(r.stats()[0].max_width, 1);
    assert_eq!(r.read_int().unwrap(), Some(7));
    assert_eq!(r.read_int().unwrap(), None);
    assert_eq!(r.read_int().unwrap(), Some(-4));
}

// ─────────────────────────────────────────────────────────────────────────────
// A value larger than the 16 KiB buffer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn binary_payload_spanning_buffers() {
    let blob: Vec<u8> = (0u8..=255).cycle().take(40_000).collect();
    let schema = Schema::new(vec![Column::new("blob", ColumnKind::Binary)]);

    for compress in [false, true] {
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
        w.write_binary(Some(&blob)).unwrap();
        w.close().unwrap();

        let mut r = Reader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(r.stats()[0].max_width, 40_000);
        assert_eq!(r.read_binary().unwrap().as_deref(), Some(blob.as_slice()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata round trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn metadata_round_trip() {
    let schema = Schema::new(vec![Column::new("x", ColumnKind::Integer)]);
    let mut bytes = Vec::new();
    let mut w = Writer::open(
        Cursor::new(&mut bytes),
        &schema,
        &WriterOptions {
            compress: false,
            metadata_type: 7,
            metadata: vec![0xDE, 0xAD, 0xBE, 0xEF],
        },
    )
    .unwrap();
    w.write_int(Some(1)).unwrap();
    w.close().unwrap();

    // Metadata region sits right after the single column record, raw:
    // 30 header + (4 + 1 + 3 + 4 + 8 + 8) column = 58; type at 58, size at
    // 62, blob at 66.
    assert_eq!(i32::from_le_bytes(bytes[58..62].try_into().unwrap()), 7);
    assert_eq!(i32::from_le_bytes(bytes[62..66].try_into().unwrap()), 4);
    assert_eq!(&bytes[66..70], &[0xDE, 0xAD, 0xBE, 0xEF]);

    let mut r = Reader::open(Cursor::new(bytes)).unwrap();
    assert_eq!(r.metadata_type(), 7);
    assert_eq!(r.metadata(), Some([0xDE, 0xAD, 0xBE, 0xEF].as_slice()));
    assert_eq!(r.read_int().unwrap(), Some(1));
}

// ─────────────────────────────────────────────────────────────────────────────
// Every kind, with nulls, both compression modes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn all_kinds_round_trip() {
    let schema = Schema::new(vec![
        Column::new("i", ColumnKind::Integer),
        Column::new("l", ColumnKind::Long),
        Column::new("f", ColumnKind::Float),
        Column::new("d", ColumnKind::Double),
        Column::new("b", ColumnKind::Boolean),
        Column::new("s", ColumnKind::String),
        Column::new("y", ColumnKind::Binary),
        Column::new("dt", ColumnKind::Date),
        Column::new("ts", ColumnKind::Datetime),
        Column::new("tm", ColumnKind::Time),
    ]);

    for compress in [false, true] {
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

        // Row 0: all present.
        w.write_int(Some(-123)).unwrap();
        w.write_long(Some(1i64 << 40)).unwrap();
        w.write_float(Some(2.5)).unwrap();
        w.write_double(Some(-9_000.125)).unwrap();
        w.write_bool(Some(true)).unwrap();
        w.write_string(Some("déjà vu")).unwrap();
        w.write_binary(Some(&[0, 1, 2, 255])).unwrap();
        w.write_date(Some(Date::new(2024, 2, 29))).unwrap();
        w.write_datetime(Some(1_700_000_000)).unwrap();
        w.write_time(Some(Time::new(12, 34, 56))).unwrap();
        // Row 1: all null.
        w.write_int(None).unwrap();
        w.write_long(None).unwrap();
        w.write_float(None).unwrap();
        w.write_double(None).unwrap();
        w.write_bool(None).unwrap();
        w.write_string(None).unwrap();
        w.write_binary(None).unwrap();
        w.write_date(None).unwrap();
        w.write_datetime(None).unwrap();
        w.write_time(None).unwrap();
        w.close().unwrap();

        let mut r = Reader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(r.n_rows(), 2);

        let row = r.read_row().unwrap().expect("row 0").to_vec();
        assert_eq!(row[0], Some(Value::Integer(-123)));
        assert_eq!(row[1], Some(Value::Long(1i64 << 40)));
        assert_eq!(row[2], Some(Value::Float(2.5)));
        assert_eq!(row[3], Some(Value::Double(-9_000.125)));
        assert_eq!(row[4], Some(Value::Boolean(true)));
        assert_eq!(row[5], Some(Value::String("déjà vu".into())));
        assert_eq!(row[6], Some(Value::Binary(vec![0, 1, 2, 255])));
        assert_eq!(row[7], Some(Value::Date(Date::new(2024, 2, 29))));
        assert_eq!(row[8], Some(Value::Datetime(1_700_000_000)));
        assert_eq!(row[9], Some(Value::Time(Time::new(12, 34, 56))));

        let row = r.read_row().unwrap().expect("row 1");
        assert!(row.iter().all(Option::is_none));
        for stats in r.stats() {
            assert_eq!(stats.null_count, 1);
        }
        assert!(r.read_row().unwrap().is_none());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compression transparency and close determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn compression_is_transparent_to_readers() {
    let decode = |bytes: Vec<u8>| {
        let mut r = Reader::open(Cursor::new(bytes)).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = r.read_row().unwrap() {
            rows.push(row.to_vec());
        }
        rows
    };
    assert_eq!(decode(write_people(false)), decode(write_people(true)));
}

#[test]
fn writing_twice_yields_byte_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for name in ["a.sorbet", "b.sorbet"] {
        let path = dir.path().join(name);
        let mut w = Writer::create(
            &path,
            &people_schema(),
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
        paths.push(path);
    }
    let a = std::fs::read(&paths[0]).unwrap();
    let b = std::fs::read(&paths[1]).unwrap();
    assert_eq!(a, b);

    // And the file-backed reader sees the same rows.
    let mut r = Reader::open_path(&paths[0]).unwrap();
    assert_eq!(r.read_int().unwrap(), Some(1));
    assert_eq!(r.read_string().unwrap().as_deref(), Some("Moe"));
    r.close();
}

// ─────────────────────────────────────────────────────────────────────────────
// Mid-row close records completed rows only
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn close_mid_row_records_completed_rows() {
    let mut bytes = Vec::new();
    let mut w = Writer::open(
        Cursor::new(&mut bytes),
        &people_schema(),
        &WriterOptions::default(),
    )
    .unwrap();
    w.write_int(Some(1)).unwrap();
    w.write_string(Some("Moe")).unwrap();
    w.write_int(Some(2)).unwrap(); // dangling cell
    w.close().unwrap();

    let mut r = Reader::open(Cursor::new(bytes)).unwrap();
    assert_eq!(r.n_rows(), 1);
    let rows: i64 = std::iter::from_fn(|| r.read_row().unwrap().map(|_| 1))
        .sum();
    assert_eq!(rows, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Large row volume crossing many buffer boundaries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn many_rows_cross_buffer_boundaries() {
    let schema = Schema::new(vec![
        Column::new("n", ColumnKind::Long),
        Column::new("tag", ColumnKind::String),
    ]);
    for compress in [false, true] {
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
        for i in 0..5_000i64 {
            w.write_long(Some(i * i)).unwrap();
            w.write_string(Some(&format!("row-{i}"))).unwrap();
        }
        w.close().unwrap();

        let mut r = Reader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(r.n_rows(), 5_000);
        for i in 0..5_000i64 {
            assert_eq!(r.read_long().unwrap(), Some(i * i));
            assert_eq!(r.read_string().unwrap().as_deref(), Some(format!("row-{i}").as_str()));
        }
        assert!(matches!(r.read_long(), Err(Error::EndOfRows)));
    }
}
