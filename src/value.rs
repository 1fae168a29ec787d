use std::{fmt, ops, rc::Rc};

use crate::{ObjClosure, ObjFun, Object, RuntimeError};

/// This represents a Lox type and its data at.
#[derive(Debug, Clone)]
pub enum Value {
    /// A nothing value in Lox
    Nil,
    /// A boolean value in Lox
    Bool(bool),
    /// A number value in Lox
    Number(f64),
    /// A reference to a heap allocated object
    Object(Object),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Object(o) => write!(f, "{o}"),
        }
    }
}

/// Format a number the way C's `%g` does: six significant digits, trailing
/// zeros removed, scientific notation for very small or very large magnitudes.
fn format_number(n: f64) -> String {
    const PRECISION: i32 = 6;
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Rounding to the precision first decides which notation is used.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Object(Object::String(Rc::from(s)))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Object(Object::String(Rc::from(s)))
    }
}

impl From<Rc<ObjFun>> for Value {
    fn from(fun: Rc<ObjFun>) -> Self {
        Self::Object(Object::Fun(fun))
    }
}

impl From<Rc<ObjClosure>> for Value {
    fn from(closure: Rc<ObjClosure>) -> Self {
        Self::Object(Object::Closure(closure))
    }
}

impl ops::Add for &Value {
    type Output = Result<Value, RuntimeError>;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 + n2)),
            (Value::Object(Object::String(s1)), Value::Object(Object::String(s2))) => {
                let mut res = String::with_capacity(s1.len() + s2.len());
                res.push_str(s1);
                res.push_str(s2);
                Ok(Value::from(res))
            }
            _ => Err(RuntimeError::InvalidAddOperands),
        }
    }
}

impl ops::Sub for &Value {
    type Output = Result<Value, RuntimeError>;

    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 - n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

impl ops::Mul for &Value {
    type Output = Result<Value, RuntimeError>;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 * n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

impl ops::Div for &Value {
    type Output = Result<Value, RuntimeError>;

    fn div(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 / n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}

impl ops::Not for &Value {
    type Output = Value;

    fn not(self) -> Self::Output {
        Value::Bool(self.is_falsey())
    }
}

impl ops::Neg for &Value {
    type Output = Result<Value, RuntimeError>;

    fn neg(self) -> Self::Output {
        match self {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(RuntimeError::ExpectedNumber),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(v1), Self::Bool(v2)) => v1 == v2,
            (Self::Number(v1), Self::Number(v2)) => v1 == v2,
            (Self::Object(o1), Self::Object(o2)) => o1 == o2,
            _ => false,
        }
    }
}

impl Value {
    /// Return true if the value is `nil` or `false`. Every number, including
    /// zero, and every object is truthy.
    pub fn is_falsey(&self) -> bool {
        match self {
            Self::Bool(b) => !b,
            Self::Nil => true,
            _ => false,
        }
    }

    /// Check if the current value is less than the given value
    pub fn lt(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Bool(n1 < n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }

    /// Check if the current value is greater than the given value
    pub fn gt(&self, rhs: &Value) -> Result<Value, RuntimeError> {
        match (self, rhs) {
            (Value::Number(n1), Value::Number(n2)) => Ok(Value::Bool(n1 > n2)),
            _ => Err(RuntimeError::ExpectedNumbers),
        }
    }
}
