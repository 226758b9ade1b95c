use crate::{Error, NativeContext, Status, Value};

/// `f.call(this, ...args)`
pub fn call(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Value::Function(function) = ctx.this() else {
        return Err(Error::TypeError("call target is not a function"));
    };
    let this = ctx.argument(1);
    let args = ctx.rest(2).to_vec();
    ctx.activate(&function, &this, &args)
}

/// `f.apply(this, array)`; a null or undefined argument list means none.
pub fn apply(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Value::Function(function) = ctx.this() else {
        return Err(Error::TypeError("apply target is not a function"));
    };
    let this = ctx.argument(1);
    let args = match ctx.argument(2) {
        Value::Array(array) => array.borrow().values().collect(),
        Value::Undefined | Value::Null => Vec::new(),
        _ => return Err(Error::TypeError("argument list is not an array")),
    };
    ctx.activate(&function, &this, &args)
}

/// `f.bind(this, ...args)`, always producing an independent copy.
pub fn bind(ctx: &mut NativeContext) -> Result<Status, Error> {
    let Value::Function(function) = ctx.this() else {
        return Err(Error::TypeError("bind target is not a function"));
    };
    let bound = function.bind(ctx.rest(1));
    ctx.ret(Value::function(bound))
}

#[cfg(test)]
mod tests {
    use crate::{BinaryOp, CodeBuilder, Engine, Error, Value};

    /// `function (a, b) { return this + a - b }`
    fn combine() -> Value {
        let mut b = CodeBuilder::new("combine");
        let a = b.param("a");
        let c = b.param("b");
        let t = b.temp();
        b.binary(BinaryOp::Add, t, b.this(), a);
        b.binary(BinaryOp::Sub, t, t, c);
        b.ret(t);
        Value::function(b.build())
    }

    fn method(engine: &Engine, name: &str) -> Value {
        engine.function_method(name).unwrap_or_default()
    }

    #[test]
    fn call_passes_this_and_arguments() {
        let mut engine = Engine::default();
        let call = method(&engine, "call");
        let result = engine
            .call(
                &call,
                combine(),
                &[Value::Number(10.0), Value::Number(5.0), Value::Number(2.0)],
            )
            .expect("call");
        assert_eq!(result.as_number(), Some(13.0));
        assert_eq!(engine.depth(), 1);
    }

    #[test]
    fn apply_spreads_array_and_accepts_null() {
        let mut engine = Engine::default();
        let apply = method(&engine, "apply");
        let args = Value::array(vec![Value::Number(5.0), Value::Number(2.0)]);
        let result = engine
            .call(&apply, combine(), &[Value::Number(1.0), args])
            .expect("apply");
        assert_eq!(result.as_number(), Some(4.0));

        let result = engine
            .call(&apply, combine(), &[Value::Number(1.0), Value::Null])
            .expect("apply");
        assert!(result.as_number().is_some_and(f64::is_nan));

        let err = engine.call(&apply, combine(), &[Value::Null, Value::Number(1.0)]);
        assert!(matches!(err, Err(Error::TypeError(_))));
    }

    #[test]
    fn call_on_non_function_is_type_error() {
        let mut engine = Engine::default();
        let call = method(&engine, "call");
        let err = engine.call(&call, Value::Number(1.0), &[]);
        assert!(matches!(err, Err(Error::TypeError(_))));
        assert_eq!(engine.depth(), 1);
    }

    #[test]
    fn bound_function_prepends_arguments() {
        let mut engine = Engine::default();
        let bind = method(&engine, "bind");
        let bound = engine
            .call(&bind, combine(), &[Value::Number(100.0), Value::Number(1.0)])
            .expect("bind");
        let result = engine.call(&bound, Value::Null, &[Value::Number(50.0)]).expect("bound");
        assert_eq!(result.as_number(), Some(51.0));

        // rebinding keeps `this` and appends arguments
        let rebound = engine
            .call(&bind, bound, &[Value::Number(0.0), Value::Number(7.0)])
            .expect("rebind");
        let result = engine.call(&rebound, Value::Null, &[]).expect("rebound");
        assert_eq!(result.as_number(), Some(94.0));
    }

    #[test]
    fn call_reaches_native_targets() {
        let mut engine = Engine::default();
        let call = method(&engine, "call");
        let push = engine.array_method("push").unwrap_or_default();
        let array = Value::array(vec![]);
        let length = engine
            .call(&call, push, &[array.clone(), Value::Number(1.0)])
            .expect("push.call");
        assert_eq!(length.as_number(), Some(1.0));
        assert_eq!(array.to_string(), "1");
    }
}
