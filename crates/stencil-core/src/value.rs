use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::BitOr;

use itertools::Itertools;
use rustc_hash::FxHasher;
#[cfg(feature = "ast-json")]
use serde::{Deserialize, Serialize};

use crate::handle::{HostHandle, NativePtr};

/// Bit set selecting which value shapes count as false besides
/// `Bool(false)`.
///
/// The host template dialect picks its policy once at configuration time and
/// supplies it through [`RenderContext::falsiness`](crate::RenderContext::falsiness).
#[cfg_attr(feature = "ast-json", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Falsiness(u8);

impl Falsiness {
    /// Only `Bool(false)` is falsy.
    pub const NONE: Falsiness = Falsiness(0);
    /// `Int(0)` and `Float(0.0)` are falsy.
    pub const ZERO: Falsiness = Falsiness(1);
    /// `String("")` is falsy.
    pub const EMPTY_STRING: Falsiness = Falsiness(1 << 1);
    /// `Nil` and null pointers are falsy.
    pub const NIL: Falsiness = Falsiness(1 << 2);
    /// All policy bits set.
    pub const ALL: Falsiness = Falsiness(0b111);

    pub fn contains(&self, other: Falsiness) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Falsiness {
    type Output = Falsiness;

    fn bitor(self, rhs: Falsiness) -> Falsiness {
        Falsiness(self.0 | rhs.0)
    }
}

impl Debug for Falsiness {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Falsiness({:#05b})", self.0)
    }
}

/// The dynamic runtime value of the template language.
///
/// Exactly one representation is active at a time. `StringView` borrows
/// externally owned text (typically literal source text) and is tied to the
/// `'s` lifetime so a view can never outlive its source; `Value<'static>` is
/// the fully owned form and coerces to any shorter lifetime.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value<'s> {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringView(&'s str),
    Array(Vec<Value<'s>>),
    Handle(HostHandle),
    Pointer(NativePtr),
}

impl<'s> Value<'s> {
    pub const NIL: Value<'static> = Value::Nil;
    pub const TRUE: Value<'static> = Value::Bool(true);
    pub const FALSE: Value<'static> = Value::Bool(false);

    /// Wraps an engine-internal opaque address. A null address normalizes to
    /// `Nil`.
    pub fn from_ptr(address: *const ()) -> Value<'static> {
        if address.is_null() {
            Value::Nil
        } else {
            Value::Pointer(NativePtr::new(address))
        }
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline(always)]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    #[inline(always)]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline(always)]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::StringView(_) => "string",
            Value::Array(_) => "array",
            Value::Handle(_) => "handle",
            Value::Pointer(_) => "pointer",
        }
    }

    /// Evaluates truthiness under the given falsiness policy.
    ///
    /// `Bool(false)` is falsy under every policy. A borrowed view is always
    /// truthy; the empty-string bit applies to owned strings only.
    pub fn is_truthy(&self, falsiness: Falsiness) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => !(falsiness.contains(Falsiness::ZERO) && *i == 0),
            Value::Float(f) => !(falsiness.contains(Falsiness::ZERO) && *f == 0.0),
            Value::Nil => !falsiness.contains(Falsiness::NIL),
            Value::Pointer(p) => !(falsiness.contains(Falsiness::NIL) && p.is_null()),
            Value::String(s) => !(falsiness.contains(Falsiness::EMPTY_STRING) && s.is_empty()),
            _ => true,
        }
    }

    /// Coerces to text.
    ///
    /// Floats format with six fixed decimal places, then trailing zero digits
    /// and a trailing decimal point are trimmed (`3.140000` becomes `3.14`,
    /// `3.000000` becomes `3`). Non-textual, non-numeric variants yield empty
    /// text.
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::StringView(s) => (*s).to_string(),
            Value::Float(f) => format_float(*f),
            Value::Int(i) => i.to_string(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            _ => String::new(),
        }
    }

    /// Coerces to an integer. Floats truncate toward zero; strings parse
    /// their longest leading numeric prefix (a non-numeric prefix yields 0).
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::String(s) => parse_int_prefix(s),
            Value::StringView(s) => parse_int_prefix(s),
            _ => 0,
        }
    }

    /// Coerces to a float, with the same leading-prefix leniency as
    /// [`Value::to_int`].
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => parse_float_prefix(s),
            Value::StringView(s) => parse_float_prefix(s),
            _ => 0.0,
        }
    }

    /// Stable hash of discriminant and payload as a `u64`.
    ///
    /// A `String` and an equal-content `StringView` hash identically. Arrays
    /// hash to a constant: arrays are not usable as reliable keys, a known
    /// limitation carried over from the dialect.
    pub fn hash_value(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Heterogeneous `<` with the dialect's coercion rules.
    ///
    /// The relation is deliberately asymmetric and driven by the left
    /// operand's discriminant: numeric variants coerce the other side
    /// numerically, strings compare lexically against the other side's
    /// coerced text, and a borrowed view compares with the operands swapped.
    /// `Handle` and `Pointer` order by address identity against their own
    /// discriminant only; everything else is never less-than.
    pub fn coercive_lt(&self, other: &Value<'_>) -> bool {
        match self {
            Value::Int(i) => *i < other.to_int(),
            Value::Float(f) => *f < other.to_float(),
            Value::String(s) => match other {
                Value::String(o) => s < o,
                _ => s.as_str() < other.to_text().as_str(),
            },
            Value::StringView(view) => other.to_text().as_str() < *view,
            Value::Handle(h) => match other {
                Value::Handle(o) => (h.address() as usize) < (o.address() as usize),
                _ => false,
            },
            Value::Pointer(p) => match other {
                Value::Pointer(o) => (p.address() as usize) < (o.address() as usize),
                _ => false,
            },
            _ => false,
        }
    }

    /// Materializes every borrowed view, detaching the value from its source
    /// text.
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Nil => Value::Nil,
            Value::Bool(b) => Value::Bool(b),
            Value::Int(i) => Value::Int(i),
            Value::Float(f) => Value::Float(f),
            Value::String(s) => Value::String(s),
            Value::StringView(s) => Value::String(s.to_string()),
            Value::Array(a) => Value::Array(a.into_iter().map(Value::into_owned).collect()),
            Value::Handle(h) => Value::Handle(h),
            Value::Pointer(p) => Value::Pointer(p),
        }
    }
}

fn format_float(f: f64) -> String {
    let s = format!("{:.6}", f);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

fn parse_int_prefix(s: &str) -> i64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    t[..end].parse().unwrap_or(0)
}

fn parse_float_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            b'e' | b'E' if seen_digit => {
                let mut exp = end + 1;
                if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
                    exp += 1;
                }
                if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                    end = exp;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                }
                break;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return 0.0;
    }
    t[..end].parse().unwrap_or(0.0)
}

impl Hash for Value<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => state.write_u8(0),
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            // Owned and borrowed text of equal content must hash identically.
            Value::String(s) => s.as_str().hash(state),
            Value::StringView(s) => s.hash(state),
            // Arrays are not usable as reliable keys.
            Value::Array(_) => state.write_u8(0),
            Value::Handle(h) => h.hash(state),
            Value::Pointer(p) => p.hash(state),
        }
    }
}

impl Display for Value<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::Array(a) => {
                write!(f, "[{}]", a.iter().map(|v| v.to_string()).join(", "))
            }
            _ => write!(f, "{}", self.to_text()),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value<'_> {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value<'_> {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value<'_> {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Borrowed text wraps as a view; use `String::from(..)` or
/// [`Value::into_owned`] when the value must escape the source lifetime.
impl<'s> From<&'s str> for Value<'s> {
    fn from(s: &'s str) -> Self {
        Value::StringView(s)
    }
}

impl<'s> From<Vec<Value<'s>>> for Value<'s> {
    fn from(a: Vec<Value<'s>>) -> Self {
        Value::Array(a)
    }
}

impl From<HostHandle> for Value<'_> {
    fn from(h: HostHandle) -> Self {
        Value::Handle(h)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(3.0, "3")]
    #[case(3.14, "3.14")]
    #[case(3.10, "3.1")]
    #[case(-2.5, "-2.5")]
    #[case(0.0, "0")]
    #[case(10.0, "10")]
    #[case(0.000001, "0.000001")]
    fn test_float_to_text(#[case] input: f64, #[case] expected: &str) {
        assert_eq!(Value::Float(input).to_text(), expected);
    }

    #[rstest]
    #[case(Value::Int(42), "42")]
    #[case(Value::Bool(true), "true")]
    #[case(Value::Bool(false), "false")]
    #[case(Value::String("hi".to_string()), "hi")]
    #[case(Value::StringView("view"), "view")]
    #[case(Value::Nil, "")]
    #[case(Value::Handle(HostHandle::NULL), "")]
    #[case(Value::Array(vec![Value::Int(1)]), "")]
    fn test_to_text(#[case] input: Value, #[case] expected: &str) {
        assert_eq!(input.to_text(), expected);
    }

    #[rstest]
    #[case("42", 42)]
    #[case("  42", 42)]
    #[case("-7", -7)]
    #[case("+9", 9)]
    #[case("42abc", 42)]
    #[case("abc", 0)]
    #[case("", 0)]
    #[case("-", 0)]
    fn test_string_to_int(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(Value::String(input.to_string()).to_int(), expected);
        assert_eq!(Value::StringView(input).to_int(), expected);
    }

    #[rstest]
    #[case("3.14", 3.14)]
    #[case("3.14stone", 3.14)]
    #[case("1.2.3", 1.2)]
    #[case(".5", 0.5)]
    #[case("2e3", 2000.0)]
    #[case("2e", 2.0)]
    #[case("-1.5e-1", -0.15)]
    #[case("abc", 0.0)]
    fn test_string_to_float(#[case] input: &str, #[case] expected: f64) {
        assert!((Value::StringView(input).to_float() - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(Value::Float(3.9), 3)]
    #[case(Value::Float(-3.9), -3)]
    #[case(Value::Int(5), 5)]
    #[case(Value::Nil, 0)]
    #[case(Value::Bool(true), 0)]
    fn test_to_int(#[case] input: Value, #[case] expected: i64) {
        assert_eq!(input.to_int(), expected);
    }

    #[rstest]
    #[case(Value::Int(0), Falsiness::ZERO, false)]
    #[case(Value::Int(0), Falsiness::NONE, true)]
    #[case(Value::Int(1), Falsiness::ZERO, true)]
    #[case(Value::Float(0.0), Falsiness::ZERO, false)]
    #[case(Value::Bool(false), Falsiness::NONE, false)]
    #[case(Value::Bool(false), Falsiness::ALL, false)]
    #[case(Value::Bool(true), Falsiness::ALL, true)]
    #[case(Value::Nil, Falsiness::NIL, false)]
    #[case(Value::Nil, Falsiness::NONE, true)]
    #[case(Value::String(String::new()), Falsiness::EMPTY_STRING, false)]
    #[case(Value::String(String::new()), Falsiness::ZERO, true)]
    #[case(Value::StringView(""), Falsiness::ALL, true)]
    #[case(Value::Array(Vec::new()), Falsiness::ALL, true)]
    fn test_is_truthy(#[case] value: Value, #[case] falsiness: Falsiness, #[case] expected: bool) {
        assert_eq!(value.is_truthy(falsiness), expected);
    }

    #[test]
    fn test_falsiness_bits() {
        let policy = Falsiness::ZERO | Falsiness::NIL;
        assert!(policy.contains(Falsiness::ZERO));
        assert!(policy.contains(Falsiness::NIL));
        assert!(!policy.contains(Falsiness::EMPTY_STRING));
        assert!(Falsiness::ALL.contains(policy));
    }

    #[test]
    fn test_string_and_view_hash_identically() {
        let owned = Value::String("abc".to_string());
        let view = Value::StringView("abc");
        assert_eq!(owned.hash_value(), view.hash_value());
        // Equal hashes, unequal discriminants.
        assert_ne!(owned, view);
    }

    #[test]
    fn test_array_hash_constant() {
        let a = Value::Array(vec![Value::Int(1)]);
        let b = Value::Array(vec![Value::String("x".to_string()), Value::Bool(true)]);
        assert_eq!(a.hash_value(), b.hash_value());
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.0));
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::StringView("a")]),
            Value::Array(vec![Value::Int(1), Value::StringView("a")]),
        );
        assert_ne!(
            Value::Array(vec![Value::Int(1)]),
            Value::Array(vec![Value::Int(2)]),
        );
        assert_eq!(Value::Int(7).hash_value(), Value::Int(7).hash_value());
    }

    #[rstest]
    #[case(Value::Int(2), Value::Int(3), true)]
    #[case(Value::Int(3), Value::Int(3), false)]
    #[case(Value::Int(2), Value::Float(2.5), true)]
    #[case(Value::Float(1.5), Value::Int(2), true)]
    #[case(Value::Int(2), Value::StringView("10"), true)]
    // The string side compares lexically against the other side's coerced
    // text: "10" < "9".
    #[case(Value::String("10".to_string()), Value::Int(9), true)]
    #[case(Value::String("9".to_string()), Value::Int(10), false)]
    #[case(Value::String("a".to_string()), Value::String("b".to_string()), true)]
    // The view case compares with the operands swapped.
    #[case(Value::StringView("b"), Value::String("a".to_string()), true)]
    #[case(Value::StringView("a"), Value::String("b".to_string()), false)]
    #[case(Value::Nil, Value::Int(1), false)]
    #[case(Value::Bool(false), Value::Bool(true), false)]
    fn test_coercive_lt(#[case] lhs: Value, #[case] rhs: Value, #[case] expected: bool) {
        assert_eq!(lhs.coercive_lt(&rhs), expected);
    }

    #[test]
    fn test_from_ptr_normalizes_null() {
        assert_eq!(Value::from_ptr(std::ptr::null()), Value::Nil);
        let target = 1_u8;
        let value = Value::from_ptr(&target as *const u8 as *const ());
        assert!(matches!(value, Value::Pointer(_)));
    }

    #[test]
    fn test_null_handle_stays_handle() {
        assert_eq!(
            Value::from(HostHandle::NULL),
            Value::Handle(HostHandle::NULL)
        );
    }

    #[test]
    fn test_into_owned_materializes_views() {
        let source = String::from("borrowed");
        let value = Value::Array(vec![Value::StringView(&source), Value::Int(1)]);
        let owned: Value<'static> = value.into_owned();
        drop(source);
        assert_eq!(
            owned,
            Value::Array(vec![Value::String("borrowed".to_string()), Value::Int(1)])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::StringView("a")]).to_string(),
            "[1, a]"
        );
        assert_eq!(Value::Nil.to_string(), "");
    }
}
