use ordered_float::OrderedFloat;

use crate::value::Value;

pub(crate) const TAG_INT: u8 = 1;
pub(crate) const TAG_DOUBLE: u8 = 2;
pub(crate) const TAG_STRING: u8 = 4;
pub(crate) const TAG_DUAL_INT: u8 = 5;
pub(crate) const TAG_DUAL_DOUBLE: u8 = 6;

/// A value stored in a column's symbol table. Exactly one variant holds;
/// there is no "empty" symbol.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Symbol {
    Int(i32),
    Double(f64),
    String(String),
    DualInt(i32, String),
    DualDouble(f64, String),
}

impl Symbol {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Symbol::Int(_) => TAG_INT,
            Symbol::Double(_) => TAG_DOUBLE,
            Symbol::String(_) => TAG_STRING,
            Symbol::DualInt(_, _) => TAG_DUAL_INT,
            Symbol::DualDouble(_, _) => TAG_DUAL_DOUBLE,
        }
    }

    /// The string component if present, else the integer component, else
    /// the double component.
    pub(crate) fn primary_value(&self) -> Value {
        match self {
            Symbol::Int(i) => Value::Integer(*i as i64),
            Symbol::Double(d) => Value::Float(*d),
            Symbol::String(s) => Value::Text(s.clone()),
            Symbol::DualInt(_, s) => Value::Text(s.clone()),
            Symbol::DualDouble(_, s) => Value::Text(s.clone()),
        }
    }

    /// A hashable, total-order key used for column-local deduplication.
    /// `Symbol` itself carries plain `f64`s (matching the wire shape); this
    /// key exists only so doubles can live in a `HashMap` without falling
    /// afoul of `f64`'s lack of `Eq`.
    pub(crate) fn dedup_key(&self) -> SymbolKey {
        match self {
            Symbol::Int(i) => SymbolKey::Int(*i),
            Symbol::Double(d) => SymbolKey::Double(OrderedFloat(*d)),
            Symbol::String(s) => SymbolKey::String(s.clone()),
            Symbol::DualInt(i, s) => SymbolKey::DualInt(*i, s.clone()),
            Symbol::DualDouble(d, s) => SymbolKey::DualDouble(OrderedFloat(*d), s.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SymbolKey {
    Int(i32),
    Double(OrderedFloat<f64>),
    String(String),
    DualInt(i32, String),
    DualDouble(OrderedFloat<f64>, String),
}

/// Classifies a raw cell value into the `Symbol` the writer will emit.
///
/// Null maps to an empty string symbol: the wire format has no null tag,
/// so this is the writer's policy for representing absence, not a guess
/// at the source's behavior.
pub(crate) fn classify(value: &Value) -> Symbol {
    match value {
        Value::Text(s) => Symbol::String(s.clone()),
        Value::Null => Symbol::String(String::new()),
        Value::Integer(i) => classify_integer(*i),
        Value::Float(f) => classify_float(*f),
    }
}

/// `Value::Integer` is always a whole number already, so its i32-range test
/// is a plain integer comparison, never a detour through `f64`: an `i64`
/// magnitude beyond 2^53 loses precision on an `as f64` cast, which would
/// silently change which integer a column's textual form names. The text
/// component is built from `i`'s own `to_string()` in both branches, so it
/// stays exact even in the `DualDouble` branch, where the wire format's
/// `f64` payload is unavoidably lossy (there is no i64 wire tag).
fn classify_integer(i: i64) -> Symbol {
    if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
        let n = i as i32;
        Symbol::DualInt(n, n.to_string())
    } else {
        tracing::debug!(
            target: "qvd::encode",
            value = i,
            "integer outside i32 range, classified as DualDouble"
        );
        Symbol::DualDouble(i as f64, i.to_string())
    }
}

fn classify_float(value: f64) -> Symbol {
    if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        let i = value as i32;
        Symbol::DualInt(i, i.to_string())
    } else {
        if value.fract() == 0.0 {
            tracing::debug!(
                target: "qvd::encode",
                value,
                "whole number outside i32 range, classified as DualDouble"
            );
        }
        Symbol::DualDouble(value, format!("{value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_value_rule() {
        assert_eq!(Symbol::Int(7).primary_value(), Value::Integer(7));
        assert_eq!(Symbol::Double(2.5).primary_value(), Value::Float(2.5));
        assert_eq!(
            Symbol::String("hi".into()).primary_value(),
            Value::Text("hi".into())
        );
        assert_eq!(
            Symbol::DualInt(3, "3".into()).primary_value(),
            Value::Text("3".into())
        );
        assert_eq!(
            Symbol::DualDouble(2.5, "2.5".into()).primary_value(),
            Value::Text("2.5".into())
        );
    }

    #[test]
    fn classify_whole_number_becomes_dual_int() {
        assert_eq!(
            classify(&Value::Integer(1)),
            Symbol::DualInt(1, "1".into())
        );
        assert_eq!(
            classify(&Value::Float(2.0)),
            Symbol::DualInt(2, "2".into())
        );
    }

    #[test]
    fn classify_fractional_number_becomes_dual_double() {
        assert_eq!(
            classify(&Value::Float(2.5)),
            Symbol::DualDouble(2.5, "2.5".into())
        );
    }

    #[test]
    fn classify_guards_i32_range() {
        let big = i32::MAX as f64 + 1.0;
        match classify(&Value::Float(big)) {
            Symbol::DualDouble(d, _) => assert_eq!(d, big),
            other => panic!("expected DualDouble for out-of-range whole value, got {other:?}"),
        }
    }

    #[test]
    fn classify_max_i32_textual_form() {
        assert_eq!(
            classify(&Value::Integer(2147483647)),
            Symbol::DualInt(2147483647, "2147483647".into())
        );
    }

    #[test]
    fn classify_large_i64_preserves_exact_decimal_text() {
        // Beyond 2^53, `as f64` loses precision; the text component must
        // still name the original integer exactly, since it (not the lossy
        // double) is what a decoded cell's primary value comes back as.
        let large = 9_007_199_254_740_993i64;
        match classify(&Value::Integer(large)) {
            Symbol::DualDouble(_, s) => assert_eq!(s, "9007199254740993"),
            other => panic!("expected DualDouble for out-of-i32-range integer, got {other:?}"),
        }
    }

    #[test]
    fn classify_null_is_empty_string() {
        assert_eq!(classify(&Value::Null), Symbol::String(String::new()));
    }
}
