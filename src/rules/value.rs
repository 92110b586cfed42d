//! Typed attribute values and their conversion to build-file expressions.

use crate::bzl::{Expr, ExprKind};
use crate::platform::PlatformStrings;

/// A typed value assignable to a rule attribute. Converting to an expression
/// may yield nothing (empty list, empty carrier), which callers treat as
/// "drop the attribute".
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Strings(Vec<String>),
    Platform(PlatformStrings),
    Raw(Expr),
}

impl Value {
    pub fn into_expr(self) -> Option<Expr> {
        match self {
            Value::Str(s) => Some(Expr::string(&s)),
            Value::Bool(b) => Some(Expr::ident(if b { "True" } else { "False" })),
            Value::Int(v) => Some(Expr::new(ExprKind::Int(v))),
            Value::Strings(values) => {
                if values.is_empty() {
                    return None;
                }
                Some(Expr::list(values.iter().map(|v| Expr::string(v)).collect()))
            }
            Value::Platform(ps) => ps.to_expr(),
            Value::Raw(e) => Some(e),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Value {
        Value::Strings(v)
    }
}

impl From<PlatformStrings> for Value {
    fn from(v: PlatformStrings) -> Value {
        Value::Platform(v)
    }
}

impl From<Expr> for Value {
    fn from(v: Expr) -> Value {
        Value::Raw(v)
    }
}

/// Values carried on a rule between pipeline phases without ever being
/// printed. The resolver reads import lists from here.
#[derive(Clone, Debug, PartialEq)]
pub enum PrivateValue {
    Str(String),
    Strings(Vec<String>),
    Bool(bool),
    Platform(PlatformStrings),
}

impl PrivateValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrivateValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_platform(&self) -> Option<&PlatformStrings> {
        match self {
            PrivateValue::Platform(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            PrivateValue::Strings(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_converts_to_none() {
        assert!(Value::Strings(Vec::new()).into_expr().is_none());
        assert!(Value::Platform(PlatformStrings::new()).into_expr().is_none());
    }

    #[test]
    fn bool_converts_to_ident() {
        let e = Value::Bool(true).into_expr().expect("expr");
        assert_eq!(e.kind, ExprKind::Ident("True".to_string()));
    }
}
