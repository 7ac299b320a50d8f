use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::Type;

/// Significant digits kept when a Float is written out.
pub const FLOAT_SIGNIFICANT_DIGITS: i32 = 6;

/// Shared backing store of an array. The declaring scope holds the binding;
/// callees receive a clone of the handle and mutate the same elements.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Array(ArrayRef),
}

impl Value {
    /// Zero value of a scalar type; arrays are built with [`Value::new_array`].
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Integer => Value::Integer(0),
            Type::Float => Value::Float(0.0),
            Type::String => Value::Str(String::new()),
            Type::Boolean => Value::Boolean(false),
            Type::Array(_) => Value::Array(Rc::new(RefCell::new(Vec::new()))),
        }
    }

    /// Allocates a zero-filled array; `dims` lists sizes outermost first.
    pub fn new_array(element: &Type, dims: &[usize]) -> Value {
        match dims.split_first() {
            None => Value::default_for(element),
            Some((&size, rest)) => {
                let items = (0..size).map(|_| Value::new_array(element, rest)).collect();
                Value::Array(Rc::new(RefCell::new(items)))
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::Boolean(_) => "BOOLEAN",
            Value::Array(_) => "ARRAY",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Widens an Integer stored into a Float location; anything else is kept.
    pub fn coerce_to(self, ty: &Type) -> Value {
        match (ty, self) {
            (Type::Float, Value::Integer(value)) => Value::Float(value as f64),
            (_, value) => value,
        }
    }
}

/// Rounds to [`FLOAT_SIGNIFICANT_DIGITS`] significant digits and trims
/// trailing zeros, always keeping one digit after the point. Values whose
/// decimal exponent is below -4 or at least the digit count use `e` notation.
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }

    let precision = (FLOAT_SIGNIFICANT_DIGITS - 1) as usize;
    let scientific = format!("{value:.precision$e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..FLOAT_SIGNIFICANT_DIGITS).contains(&exponent) {
        return format!("{}e{exponent}", trim_fraction(mantissa));
    }
    let decimals = (FLOAT_SIGNIFICANT_DIGITS - 1 - exponent) as usize;
    trim_fraction(&format!("{value:.decimals$}"))
}

fn trim_fraction(text: &str) -> String {
    let mut text = text.to_string();
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').len();
        text.truncate(trimmed);
        if text.ends_with('.') {
            text.push('0');
        }
    } else {
        text.push_str(".0");
    }
    text
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => f.write_str(&format_float(*value)),
            Value::Str(value) => f.write_str(value),
            Value::Boolean(true) => f.write_str("TRUE"),
            Value::Boolean(false) => f.write_str("FALSE"),
            Value::Array(items) => write!(f, "ARRAY[{}]", items.borrow().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(1.0 / 3.0), "0.333333");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(-12.25), "-12.25");
        assert_eq!(format_float(123456.7), "123457.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(0.0001234), "0.0001234");
    }

    #[test]
    fn test_large_and_tiny_floats_use_exponent() {
        assert_eq!(format_float(1234567.0), "1.23457e6");
        assert_eq!(format_float(1.0e20), "1.0e20");
        assert_eq!(format_float(999999.7), "1.0e6");
        assert_eq!(format_float(99999.97), "100000.0");
        assert_eq!(format_float(-2.5e-7), "-2.5e-7");
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Value::Integer(-42).to_string(), "-42");
        assert_eq!(Value::Boolean(true).to_string(), "TRUE");
        assert_eq!(Value::Boolean(false).to_string(), "FALSE");
        assert_eq!(Value::Str("hi there".to_string()).to_string(), "hi there");
    }

    #[test]
    fn test_new_array_is_zero_filled_and_nested() {
        let Value::Array(rows) = Value::new_array(&Type::Integer, &[2, 3]) else {
            panic!("expected an array");
        };
        let rows = rows.borrow();
        assert_eq!(rows.len(), 2);
        for row in rows.iter() {
            let Value::Array(items) = row else {
                panic!("expected a nested array");
            };
            assert_eq!(*items.borrow(), vec![Value::Integer(0); 3]);
        }
    }

    #[test]
    fn test_array_clone_shares_storage() {
        let original = Value::new_array(&Type::Integer, &[2]);
        let handle = original.clone();
        if let Value::Array(items) = &handle {
            items.borrow_mut()[1] = Value::Integer(7);
        }
        let Value::Array(items) = &original else {
            panic!("expected an array");
        };
        assert_eq!(items.borrow()[1], Value::Integer(7));
        assert_eq!(original.to_string(), "ARRAY[2]");
    }

    #[test]
    fn test_coerce_widens_integer_only() {
        assert_eq!(Value::Integer(2).coerce_to(&Type::Float), Value::Float(2.0));
        assert_eq!(Value::Integer(2).coerce_to(&Type::Integer), Value::Integer(2));
        assert_eq!(Value::Float(2.5).coerce_to(&Type::Integer), Value::Float(2.5));
    }
}
