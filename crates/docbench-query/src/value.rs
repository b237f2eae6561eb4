use std::cmp::Ordering;

use bson::{Bson, Document};

/// Numeric view over the three BSON number representations. Documents carry
/// numbers the way a dynamic client would, so `Int32(5)`, `Int64(5)` and
/// `Double(5.0)` are the same value for equality and ordering.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn as_number(value: &Bson) -> Option<Number> {
    match value {
        Bson::Int32(i) => Some(Number::Int(*i as i64)),
        Bson::Int64(i) => Some(Number::Int(*i)),
        Bson::Double(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

/// 2^63, the first double past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// The integer a double holds exactly, if any.
fn exact_integer(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f)).then_some(f as i64)
}

/// Integers and doubles compare exactly, without rounding the integer.
fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if f < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc() as i64;
    let fraction = if f.fract() > 0.0 {
        Ordering::Less
    } else if f.fract() < 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    };
    Some(i.cmp(&whole).then(fraction))
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (Number::Int(x), Number::Float(y)) => compare_int_float(x, y),
        (Number::Float(x), Number::Int(y)) => compare_int_float(y, x).map(Ordering::reverse),
        (Number::Float(x), Number::Float(y)) => x.partial_cmp(&y),
    }
}

pub(crate) fn is_numeric(value: &Bson) -> bool {
    as_number(value).is_some()
}

pub(crate) fn to_f64(value: &Bson) -> Option<f64> {
    as_number(value).map(Number::as_f64)
}

/// Value equality: numbers by value, arrays and documents structurally,
/// everything else by type and value. No coercion between types.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (None, None) => match (a, b) {
            (Bson::Array(x), Bson::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q))
            }
            (Bson::Document(x), Bson::Document(y)) => documents_equal(x, y),
            (Bson::DateTime(x), Bson::DateTime(y)) => {
                x.timestamp_millis() == y.timestamp_millis()
            }
            _ => a == b,
        },
        _ => false,
    }
}

pub fn documents_equal(a: &Document, b: &Document) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
}

/// Ordering used by the range operators. Only defined within one type class;
/// `None` means the operands are not comparable and the predicate fails.
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return compare_numbers(x, y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.as_str().cmp(y.as_str())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        _ => None,
    }
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 0,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 1,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::Binary(_)) => 5,
        Some(Bson::ObjectId(_)) => 6,
        Some(Bson::Boolean(_)) => 7,
        Some(Bson::DateTime(_)) => 8,
        Some(Bson::Timestamp(_)) => 9,
        Some(_) => 10,
    }
}

/// Total order used by `$sort` and `FindOptions::sort`.
///
/// Missing fields and `null` sort first, then numbers, strings, documents,
/// arrays, binary, object ids, booleans, datetimes, timestamps, and anything
/// else. NaN sorts below every other number.
pub fn sort_order(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    let (Some(a), Some(b)) = (a, b) else {
        return Ordering::Equal;
    };
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Symbol(x), Bson::Symbol(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            x.timestamp_millis().cmp(&y.timestamp_millis())
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::Binary(x), Bson::Binary(y)) => x.bytes.cmp(&y.bytes),
        (Bson::Document(x), Bson::Document(y)) => {
            for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                let ord = ka.cmp(kb).then_with(|| sort_order(Some(va), Some(vb)));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Array(x), Bson::Array(y)) => {
            for (va, vb) in x.iter().zip(y) {
                let ord = sort_order(Some(va), Some(vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => sort_numbers(x, y),
            _ => Ordering::Equal,
        },
    }
}

fn sort_numbers(a: Number, b: Number) -> Ordering {
    if let Some(ord) = compare_numbers(a, b) {
        return ord;
    }
    // At least one side is NaN.
    match (a.as_f64().is_nan(), b.as_f64().is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

/// Add two numeric values. `Int32 + Int32` stays `Int32` unless it overflows;
/// any double makes the result a double. Returns `None` for non-numbers.
pub(crate) fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    if let (Bson::Int32(x), Bson::Int32(y)) = (a, b) {
        return Some(match x.checked_add(*y) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*x as i64 + *y as i64),
        });
    }
    match (as_number(a)?, as_number(b)?) {
        (Number::Int(x), Number::Int(y)) => Some(match x.checked_add(y) {
            Some(sum) => Bson::Int64(sum),
            None => Bson::Double(x as f64 + y as f64),
        }),
        (x, y) => Some(Bson::Double(x.as_f64() + y.as_f64())),
    }
}

/// Narrowest integer representation for a computed count or sum.
pub(crate) fn integer(value: i64) -> Bson {
    match i32::try_from(value) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(value),
    }
}

pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => match as_number(other) {
            Some(n) => n.as_f64() != 0.0,
            None => true,
        },
    }
}

/// Canonical string for a value such that `values_equal(a, b)` implies equal
/// keys. Used to partition documents for `$group` in a hash map.
pub(crate) fn canonical_key(value: &Bson) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Bson, out: &mut String) {
    use std::fmt::Write;

    match value {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => match as_number(value) {
            Some(Number::Int(i)) => {
                let _ = write!(out, "n{i};");
            }
            Some(Number::Float(f)) if exact_integer(f).is_some() => {
                let _ = write!(out, "n{};", f as i64);
            }
            Some(Number::Float(f)) => {
                let _ = write!(out, "f{f:?};");
            }
            None => {}
        },
        Bson::String(s) => {
            let _ = write!(out, "s{}:{s}", s.len());
        }
        Bson::Array(items) => {
            let _ = write!(out, "a{}[", items.len());
            for item in items {
                write_canonical(item, out);
            }
            out.push(']');
        }
        Bson::Document(doc) => {
            let _ = write!(out, "d{}{{", doc.len());
            for (key, item) in doc {
                let _ = write!(out, "{}:{key}", key.len());
                write_canonical(item, out);
            }
            out.push('}');
        }
        Bson::DateTime(dt) => {
            let _ = write!(out, "t{};", dt.timestamp_millis());
        }
        Bson::Null => out.push_str("null;"),
        other => {
            let _ = write!(out, "x{other:?};");
        }
    }
}

/// Resolve a field path against a document. A literal key wins over dotted
/// traversal; numeric segments index into arrays.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if let Some(value) = doc.get(path) {
        return Some(value);
    }
    if !path.contains('.') {
        return None;
    }
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(d) => d.get(segment)?,
            Bson::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve the parent document of a path for mutation, returning it with the
/// leaf key. With `create`, missing intermediate documents are inserted.
/// Returns `None` when an intermediate segment holds a non-document value.
pub(crate) fn resolve_parent_mut<'a, 'p>(
    doc: &'a mut Document,
    path: &'p str,
    create: bool,
) -> Option<(&'a mut Document, &'p str)> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };
    let Some(parents) = parents else {
        return Some((doc, leaf));
    };

    let mut current = doc;
    for segment in parents.split('.') {
        if create && !current.contains_key(segment) {
            current.insert(segment, Document::new());
        }
        current = match current.get_mut(segment) {
            Some(Bson::Document(d)) => d,
            _ => return None,
        };
    }
    Some((current, leaf))
}
