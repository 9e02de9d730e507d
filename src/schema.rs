//! Column descriptors and per-column running statistics.

use crate::types::ColumnKind;

// ─────────────────────────────────────────────────────────────────────────────
// Column / Schema
// ─────────────────────────────────────────────────────────────────────────────

/// One column of a Sorbet schema.
///
/// `val_kind` and `key_kind` reserve element typing for the future
/// `List`/`Map` kinds; scalar columns carry [`ColumnKind::Null`] in both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub val_kind: ColumnKind,
    pub key_kind: ColumnKind,
}

impl Column {
    /// A scalar column of the given kind.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Column {
            name: name.into(),
            kind,
            val_kind: ColumnKind::Null,
            key_kind: ColumnKind::Null,
        }
    }
}

/// An ordered, finite sequence of columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    cols: Vec<Column>,
}

impl Schema {
    pub fn new(cols: Vec<Column>) -> Self {
        Schema { cols }
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn col(&self, idx: usize) -> &Column {
        &self.cols[idx]
    }

    pub fn cols(&self) -> &[Column] {
        &self.cols
    }
}

impl From<Vec<Column>> for Schema {
    fn from(cols: Vec<Column>) -> Self {
        Schema::new(cols)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ColumnStats
// ─────────────────────────────────────────────────────────────────────────────

/// Running per-column counters.
///
/// The writer updates these incrementally and bakes them into the header at
/// close; the reader restores them from the header (`max_width` then holds
/// the stored display width). Numeric maxima track the value of largest
/// magnitude; `bad_count` is reserved for a future validator and is always
/// written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnStats {
    pub max_width: i32,
    pub null_count: i64,
    pub bad_count: i64,
    pub max_int: i32,
    pub max_long: i64,
    pub max_float: f32,
    pub max_double: f64,
}

impl ColumnStats {
    pub(crate) fn note_int(&mut self, v: i32) {
        if v.unsigned_abs() > self.max_int.unsigned_abs() {
            self.max_int = v;
        }
    }

    pub(crate) fn note_long(&mut self, v: i64) {
        if v.unsigned_abs() > self.max_long.unsigned_abs() {
            self.max_long = v;
        }
    }

    pub(crate) fn note_float(&mut self, v: f32) {
        if v.abs() > self.max_float.abs() {
            self.max_float = v;
        }
    }

    pub(crate) fn note_double(&mut self, v: f64) {
        if v.abs() > self.max_double.abs() {
            self.max_double = v;
        }
    }

    pub(crate) fn note_width(&mut self, len: i32) {
        if len > self.max_width {
            self.max_width = len;
        }
    }

    pub(crate) fn note_null(&mut self) {
        self.null_count += 1;
    }

    /// Display-width hint stored in the header: decimal digit count of the
    /// magnitude maximum for numeric kinds, the byte-length maximum for
    /// string/binary, zero otherwise.
    pub(crate) fn display_width(&self, kind: ColumnKind) -> i32 {
        match kind {
            ColumnKind::Integer => decimal_digits(u64::from(self.max_int.unsigned_abs())),
            ColumnKind::Long => decimal_digits(self.max_long.unsigned_abs()),
            ColumnKind::Float => decimal_digits(self.max_float.abs().trunc() as u64),
            ColumnKind::Double => decimal_digits(self.max_double.abs().trunc() as u64),
            ColumnKind::String | ColumnKind::Binary => self.max_width,
            _ => 0,
        }
    }
}

fn decimal_digits(mut n: u64) -> i32 {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_column_reserves_null_element_kinds() {
        let c = Column::new("id", ColumnKind::Integer);
        assert_eq!(c.val_kind, ColumnKind::Null);
        assert_eq!(c.key_kind, ColumnKind::Null);
    }

    #[test]
    fn int_max_tracks_magnitude() {
        let mut s = ColumnStats::default();
        s.note_int(7);
        s.note_int(-4);
        assert_eq!(s.max_int, 7);
        // A larger-magnitude negative replaces a smaller positive.
        s.note_int(-19);
        assert_eq!(s.max_int, -19);
        // ...and a smaller positive does not replace it back.
        s.note_int(12);
        assert_eq!(s.max_int, -19);
    }

    #[test]
    fn int_min_does_not_overflow() {
        let mut s = ColumnStats::default();
        s.note_int(i32::MIN);
        assert_eq!(s.max_int, i32::MIN);
        assert_eq!(s.display_width(ColumnKind::Integer), 10);
    }

    #[test]
    fn long_max_tracks_magnitude() {
        let mut s = ColumnStats::default();
        s.note_long(-1_000_000);
        s.note_long(999_999);
        assert_eq!(s.max_long, -1_000_000);
        assert_eq!(s.display_width(ColumnKind::Long), 7);
    }

    #[test]
    fn width_tracks_longest_value() {
        let mut s = ColumnStats::default();
        s.note_width(3);
        s.note_width(5);
        s.note_width(4);
        assert_eq!(s.max_width, 5);
        assert_eq!(s.display_width(ColumnKind::String), 5);
    }

    #[test]
    fn display_width_counts_digits() {
        let mut s = ColumnStats::default();
        assert_eq!(s.display_width(ColumnKind::Integer), 1); // "0"
        s.note_int(3);
        assert_eq!(s.display_width(ColumnKind::Integer), 1);
        s.note_int(-12345);
        assert_eq!(s.display_width(ColumnKind::Integer), 5);
    }

    #[test]
    fn double_width_uses_the_double_maximum() {
        let mut s = ColumnStats::default();
        s.note_long(123_456_789);
        s.note_double(-42.75);
        assert_eq!(s.display_width(ColumnKind::Double), 2);
    }

    #[test]
    fn float_width_truncates() {
        let mut s = ColumnStats::default();
        s.note_float(999.99);
        assert_eq!(s.display_width(ColumnKind::Float), 3);
    }

    #[test]
    fn non_numeric_kinds_have_zero_width() {
        let s = ColumnStats::default();
        assert_eq!(s.display_width(ColumnKind::Boolean), 0);
        assert_eq!(s.display_width(ColumnKind::Date), 0);
        assert_eq!(s.display_width(ColumnKind::Datetime), 0);
        assert_eq!(s.display_width(ColumnKind::Time), 0);
    }

    #[test]
    fn null_counter() {
        let mut s = ColumnStats::default();
        s.note_null();
        s.note_null();
        assert_eq!(s.null_count, 2);
        assert_eq!(s.bad_count, 0);
    }
}
