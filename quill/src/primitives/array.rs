use crate::{
    Array, ArrayRef, Error, NativeContext, Status, Value,
    array::ARRAY_SPARE,
    engine::array_length,
    primitives::relative_index,
};

fn receiver(ctx: &NativeContext) -> Option<ArrayRef> {
    ctx.this().as_array().cloned()
}

pub fn constructor(ctx: &mut NativeContext) -> Result<Status, Error> {
    let array = match ctx.rest(1) {
        [length @ Value::Number(_)] => Array::allocate(array_length(length)?, ARRAY_SPARE)?,
        values => Array::from_values(values.to_vec()),
    };
    ctx.ret(Value::from_array(array))
}

pub fn is_array(ctx: &mut NativeContext) -> Result<Status, Error> {
    let result = matches!(ctx.argument(1), Value::Array(_));
    ctx.ret(Value::Boolean(result))
}

pub fn slice(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = receiver(ctx) else {
        return ctx.ret(Value::array(Vec::new()));
    };
    let sliced = {
        let array = array.borrow();
        let len = array.len();
        let begin = relative_index(&ctx.argument(1), len);
        let end = match ctx.argument(2) {
            Value::Undefined => len,
            end => relative_index(&end, len),
        };
        array.slice(begin, end)?
    };
    ctx.ret(Value::from_array(sliced))
}

pub fn push(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = receiver(ctx) else {
        return ctx.ret(Value::Undefined);
    };
    let length = array.borrow_mut().push(ctx.rest(1))?;
    ctx.ret(Value::Number(length as f64))
}

pub fn pop(ctx: &mut NativeContext) -> Result<Status, Error> {
    let value = receiver(ctx).and_then(|array| array.borrow_mut().pop());
    ctx.ret(value.unwrap_or_default())
}

pub fn unshift(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = receiver(ctx) else {
        return ctx.ret(Value::Undefined);
    };
    let length = array.borrow_mut().unshift(ctx.rest(1))?;
    ctx.ret(Value::Number(length as f64))
}

pub fn shift(ctx: &mut NativeContext) -> Result<Status, Error> {
    let value = receiver(ctx).and_then(|array| array.borrow_mut().shift());
    ctx.ret(value.unwrap_or_default())
}

pub fn splice(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = receiver(ctx) else {
        return ctx.ret(Value::array(Vec::new()));
    };
    let len = array.borrow().len();
    let (start, delete) = match ctx.nargs() {
        0 | 1 => (0, 0),
        2 => {
            let start = relative_index(&ctx.argument(1), len);
            (start, len - start)
        }
        _ => {
            let start = relative_index(&ctx.argument(1), len);
            let delete = ctx.argument(2).to_integer().clamp(0.0, (len - start) as f64);
            (start, delete as usize)
        }
    };
    let deleted = array.borrow_mut().splice(start, delete, ctx.rest(3))?;
    ctx.ret(Value::from_array(deleted))
}

pub fn reverse(ctx: &mut NativeContext) -> Result<Status, Error> {
    let this = ctx.this();
    if let Value::Array(array) = &this {
        array.borrow_mut().reverse();
    }
    ctx.ret(this)
}

/// Receiver elements first, then each argument: arrays are spread
/// (holes kept), anything else is appended as a single element.
pub fn concat(ctx: &mut NativeContext) -> Result<Status, Error> {
    let mut slots = Vec::new();
    for value in ctx.arguments {
        match value {
            Value::Array(array) => slots.extend_from_slice(array.borrow().slots()),
            other => slots.push(Some(other.clone())),
        }
    }
    ctx.ret(Value::from_array(Array::from_slots(slots)))
}

pub fn index_of(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = receiver(ctx) else {
        return ctx.ret(Value::Number(-1.0));
    };
    let array = array.borrow();
    let from = relative_index(&ctx.argument(2), array.len());
    let found = array.index_of(&ctx.argument(1), from);
    drop(array);
    ctx.ret(Value::Number(found.map_or(-1.0, |i| i as f64)))
}

pub fn last_index_of(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Some(array) = receiver(ctx) else {
        return ctx.ret(Value::Number(-1.0));
    };
    let array = array.borrow();
    let len = array.len();
    let found = match ctx.argument(2) {
        _ if len == 0 => None,
        Value::Undefined if ctx.nargs() < 3 => array.last_index_of(&ctx.argument(1), len - 1),
        from => {
            let from = from.to_integer();
            let from = if from < 0.0 { len as f64 + from } else { from };
            if from < 0.0 {
                None
            } else {
                array.last_index_of(&ctx.argument(1), from.min((len - 1) as f64) as usize)
            }
        }
    };
    drop(array);
    ctx.ret(Value::Number(found.map_or(-1.0, |i| i as f64)))
}
