//! join and toString.
//!
//! `join` converts what it can on the spot and keeps the remaining
//! elements in scratch values. Until every scratch value is a string it
//! traps, and the engine converts the offending value (running script code
//! if needed) before resuming it.
use std::rc::Rc;

use crate::{
    Continuation, Error, Location, NativeContext, Status, Trap, Value,
    coerce::{self, Coercion},
};

#[derive(Debug, Default)]
pub struct Join {
    values: Vec<Value>,
}

/// Elements that are neither strings nor rendered as empty.
fn needs_coercion(value: &Value) -> bool {
    !value.is_string() && !value.is_null_or_undefined()
}

impl Join {
    pub(crate) fn scratch(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or_default()
    }

    pub(crate) fn set_scratch(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub(crate) fn resume(&mut self, ctx: &mut NativeContext) -> Result<Status, Error> {
        let separator: Rc<str> = match ctx.argument(1) {
            Value::Undefined => ",".into(),
            Value::String(separator) => separator,
            _ => return Ok(Status::Trap(Trap::StringArg(ctx.argument_location(1)?))),
        };

        if let Some(index) = self.values.iter().position(|v| !v.is_string()) {
            let frame = ctx.frame()?;
            return Ok(Status::Trap(Trap::StringArg(Location::Scratch { frame, index })));
        }

        let Some(array) = ctx.this().as_array().cloned() else {
            return ctx.ret(Value::string(""));
        };
        let mut result = String::new();
        let mut scratch = self.values.iter();
        for (i, slot) in array.borrow().slots().iter().enumerate() {
            if i > 0 {
                result.push_str(&separator);
            }
            match slot {
                Some(Value::String(s)) => result.push_str(s),
                Some(value) if needs_coercion(value) => match scratch.next() {
                    Some(converted) => result.push_str(&converted.to_string()),
                    // appended by a toString call since the first pass
                    None => result.push_str(&value.to_string()),
                },
                _ => {}
            }
        }
        ctx.ret(Value::string(result))
    }
}

pub fn join(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = ctx.this().as_array().cloned() else {
        return ctx.ret(Value::string(""));
    };

    let values = array
        .borrow()
        .slots()
        .iter()
        .flatten()
        .filter(|value| needs_coercion(value))
        .map(|value| match coerce::string_coercion(&*ctx.engine, value) {
            Coercion::Ready(s) => Value::String(s),
            Coercion::Invoke(_) => value.clone(),
        })
        .collect();

    let mut join = Join { values };
    let status = join.resume(ctx);
    ctx.install(Continuation::Join(join));
    status
}

/// Delegates to the receiver's `join`, or yields `"[object Object]"`
/// when it has none.
pub fn to_string(ctx: &mut NativeContext) -> Result<Status, Error> {
    let this = ctx.this();
    let join = match &this {
        Value::Array(_) => ctx.engine.array_method("join"),
        Value::Object(object) => object.borrow().get("join").cloned(),
        _ => None,
    };
    let Some(Value::Function(join)) = join else {
        return ctx.ret(Value::string("[object Object]"));
    };

    let deposit = ctx.reserve(0)?;
    ctx.install(Continuation::ToString);
    match ctx.apply(&join, this, &[], deposit)? {
        Status::Ok => to_string_continuation(ctx),
        status => Ok(status),
    }
}

pub(crate) fn to_string_continuation(ctx: &mut NativeContext) -> Result<Status, Error> {
    let value = ctx.load(ctx.reserve(0)?);
    ctx.ret(value)
}
