//! The runtime `Value` type.
//!
//! Two interchangeable encodings are available, selected at compile time by
//! the `nanbox` Cargo feature:
//!
//! - default: a tagged union (`Nil | Bool | Number | Obj`).
//! - `nanbox`: all non-float kinds packed into the IEEE-754 quiet-NaN space
//!   of an `f64`, with the object pointer in the low 48 bits.
//!
//! Both modules expose the same public surface (construction, type
//! predicates, unchecked accessors, and `PartialEq` matching the equality
//! rules: different dynamic kinds are never equal; numbers compare by
//! IEEE-754 `==`, so `NaN != NaN`; objects compare by pointer identity).
//! Everything above this line (the compiler, the VM, printing) is written
//! against that shared surface and does not know which encoding is active.

#[cfg(not(feature = "nanbox"))]
mod tagged;
#[cfg(not(feature = "nanbox"))]
pub use tagged::Value;

#[cfg(feature = "nanbox")]
mod nanbox;
#[cfg(feature = "nanbox")]
pub use nanbox::Value;

use std::fmt;

use crate::object::ObjKind;

impl Value {
    #[must_use]
    pub fn is_falsey(self) -> bool {
        self.is_nil() || (self.is_bool() && !self.as_bool())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else if self.is_bool() {
            write!(f, "{}", self.as_bool())
        } else if self.is_number() {
            write!(f, "{}", format_number(self.as_number()))
        } else if let Some(obj) = self.as_obj() {
            match obj.kind() {
                ObjKind::String => write!(f, "{}", obj.as_string().as_str_lossy()),
                ObjKind::Function => write!(f, "{}", function_name(obj)),
                ObjKind::Native => write!(f, "<native fn>"),
                ObjKind::Upvalue => write!(f, "upvalue"),
                ObjKind::Closure => write!(f, "{}", function_name(obj.as_closure().function)),
                ObjKind::Class => write!(f, "{}", obj.as_class().name.as_string().as_str_lossy()),
                ObjKind::Instance => write!(
                    f,
                    "{} instance",
                    obj.as_instance().class.as_class().name.as_string().as_str_lossy()
                ),
                ObjKind::BoundMethod => {
                    write!(f, "{}", function_name(obj.as_bound_method().method.as_closure().function))
                }
            }
        } else {
            unreachable!("value is neither nil, bool, number, nor object")
        }
    }
}

fn function_name(function_obj: crate::object::ObjRef) -> String {
    let function = function_obj.as_function();
    match function.name {
        Some(name) => format!("<fn {}>", name.as_string().as_str_lossy()),
        None => "<script>".to_string(),
    }
}

/// Format a number the way C's `%g` would: the shortest round-tripping
/// representation, with no forced trailing decimal point. Rust's default
/// `f64` `Display` already produces `3` rather than `3.0` for integral
/// values, matching `%g` for the finite range this language's `NUMBER`
/// literals can produce.
#[must_use]
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjHeader, ObjKind, ObjRef};
    use std::ptr::NonNull;

    #[test]
    fn falsey_rules() {
        assert!(Value::nil().is_falsey());
        assert!(Value::bool_(false).is_falsey());
        assert!(!Value::bool_(true).is_falsey());
        assert!(!Value::number(0.0).is_falsey());
        assert!(!Value::number(f64::NAN).is_falsey());
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::number(f64::NAN);
        assert_ne!(nan, nan);
    }

    #[test]
    fn different_kinds_never_equal() {
        assert_ne!(Value::nil(), Value::bool_(false));
        assert_ne!(Value::number(0.0), Value::bool_(false));
    }

    #[test]
    fn object_equality_is_pointer_identity() {
        let mut header_a = ObjHeader {
            kind: ObjKind::Function,
            marked: false,
            next: None,
        };
        let mut header_b = ObjHeader {
            kind: ObjKind::Function,
            marked: false,
            next: None,
        };
        let a = unsafe { ObjRef::new(NonNull::new(&raw mut header_a).unwrap()) };
        let b = unsafe { ObjRef::new(NonNull::new(&raw mut header_b).unwrap()) };
        assert_eq!(Value::obj(a), Value::obj(a));
        assert_ne!(Value::obj(a), Value::obj(b));
    }
}
