//! Value: any script-visible value (number, string, array, function, ...)
//!
//! Slot: one cell of an array backing buffer. `None` is a hole, a slot that
//! was never assigned. Holes never escape as program values; reads that land
//! on one produce `undefined` or are skipped, depending on the operation.
use std::{cell::RefCell, fmt, rc::Rc};

use crate::{Array, Function, Object};

pub type ArrayRef = Rc<RefCell<Array>>;
pub type ObjectRef = Rc<RefCell<Object>>;

/// A backing-buffer cell, `None` marks a hole.
pub type Slot = Option<Value>;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
    Function(Rc<Function>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::from_array(Array::from_values(values))
    }

    pub fn from_array(array: Array) -> Self {
        Self::Array(Rc::new(RefCell::new(array)))
    }

    pub fn object(object: Object) -> Self {
        Self::Object(Rc::new(RefCell::new(object)))
    }

    pub fn function(function: Function) -> Self {
        Self::Function(Rc::new(function))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    #[inline]
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// ToBoolean
    pub fn is_true(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) | Self::Array(_) | Self::Function(_) => true,
        }
    }

    /// ToNumber for primitives, objects become NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Boolean(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Object(_) | Self::Array(_) | Self::Function(_) => f64::NAN,
        }
    }

    /// ToIntegerOrInfinity, NaN becomes 0
    pub fn to_integer(&self) -> f64 {
        let n = self.to_number();
        if n.is_nan() { 0.0 } else { n.trunc() }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Function(_) => "function",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // rust accepts "inf"/"nan" spellings that script code must not
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Number::toString for radix 10
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&number_to_string(*n)),
            Self::String(s) => f.write_str(s),
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Function(function) => write!(f, "function {}() {{ [code] }}", function.name),
            Self::Array(array) => write_array(f, array, &mut Vec::new()),
        }
    }
}

/// Writes the elements of `array` separated by commas. An array nested in
/// itself renders as empty where it recurs.
fn write_array(
    f: &mut fmt::Formatter<'_>,
    array: &ArrayRef,
    visiting: &mut Vec<*const RefCell<Array>>,
) -> fmt::Result {
    let ptr = Rc::as_ptr(array);
    if visiting.contains(&ptr) {
        return Ok(());
    }
    visiting.push(ptr);

    let array = array.borrow();
    for (i, slot) in array.slots().iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        match slot {
            Some(Value::Array(inner)) => write_array(f, inner, visiting)?,
            Some(value) if !value.is_null_or_undefined() => write!(f, "{value}")?,
            _ => {}
        }
    }

    visiting.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_to_boolean() {
        assert!(!Value::Undefined.is_true());
        assert!(!Value::Null.is_true());
        assert!(!Value::Number(0.0).is_true());
        assert!(!Value::Number(f64::NAN).is_true());
        assert!(!Value::string("").is_true());
        assert!(Value::string("0").is_true());
        assert!(Value::array(vec![]).is_true());
    }

    #[test]
    fn numbers_format_like_script_code() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(2.5), "2.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_to_number_rejects_rust_spellings() {
        assert_eq!(Value::string(" 12 ").to_number(), 12.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert_eq!(Value::string("1e3").to_number(), 1000.0);
        assert!(Value::string("inf").to_number().is_nan());
        assert!(Value::string("abc").to_number().is_nan());
    }

    #[test]
    fn strict_equality_compares_references_by_identity() {
        let a = Value::array(vec![]);
        let b = Value::array(vec![]);
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
    }

    #[test]
    fn arrays_display_holes_as_empty_segments() {
        let mut array = Array::from_values(vec![Value::Number(1.0), Value::Null]);
        array.set(3, Value::string("x")).expect("grow");
        assert_eq!(Value::from_array(array).to_string(), "1,,,x");
    }

    #[test]
    fn self_containing_array_displays_the_cycle_as_empty() {
        let array = Value::array(vec![Value::Number(1.0)]);
        let inner = Value::array(vec![array.clone(), Value::Number(2.0)]);
        if let Value::Array(a) = &array {
            a.borrow_mut().push(&[array.clone(), inner]).expect("push");
        }
        assert_eq!(array.to_string(), "1,,,2");

        // break the cycle so the test does not leak
        if let Value::Array(a) = &array {
            a.borrow_mut().truncate_or_extend(0).expect("truncate");
        }
    }
}
