use std::rc::Rc;

use crate::{Engine, Function, Value};

/// How a value becomes a string.
#[derive(Debug)]
pub enum Coercion {
    /// Converted on the spot.
    Ready(Rc<str>),
    /// Needs a call to this `toString` with the value as receiver.
    Invoke(Rc<Function>),
}

/// Primitives and functions convert directly; arrays go through the
/// built-in `toString` and objects through their own `toString` property
/// when it holds a function.
pub fn string_coercion(engine: &Engine, value: &Value) -> Coercion {
    match value {
        Value::String(s) => Coercion::Ready(Rc::clone(s)),
        Value::Array(_) => match engine.array_method("toString") {
            Some(Value::Function(to_string)) => Coercion::Invoke(to_string),
            _ => Coercion::Ready(value.to_string().into()),
        },
        Value::Object(object) => match object.borrow().get("toString") {
            Some(Value::Function(to_string)) => Coercion::Invoke(Rc::clone(to_string)),
            _ => Coercion::Ready("[object Object]".into()),
        },
        _ => Coercion::Ready(value.to_string().into()),
    }
}
